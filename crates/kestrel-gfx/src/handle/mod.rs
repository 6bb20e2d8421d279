//! Resource handles and slot allocation.
//!
//! A handle is a `(kind, slot)` pair that packs into 16 bits at serialization
//! boundaries. Each resource kind owns a [`FreeList`] that hands out slots.

mod free_list;
#[allow(clippy::module_inception)]
mod handle;

pub use free_list::FreeList;
pub use handle::{Handle, ResourceKind};
