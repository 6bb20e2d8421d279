//! Kestrel graphics command layer.
//!
//! Sits between 2D rendering code and a native graphics API:
//! - resources live behind small typed handles (`handle`, `resource`)
//! - draws are recorded into a per-frame queue with 64-bit sort keys (`queue`)
//! - the sorted frame is replayed against a [`GraphicsBackend`](backend::GraphicsBackend)
//!   issuing only the state changes between consecutive draws (`render`)
//!
//! [`RenderDevice`] ties these together for the common single-threaded case.
//! Producer/consumer setups can drive [`queue::RenderQueue`] and
//! [`render::RenderContext`] directly and hand [`queue::Frame`]s across threads.

pub mod backend;
pub mod config;
mod device;
pub mod error;
pub mod handle;
pub mod logging;
pub mod queue;
pub mod render;
pub mod resource;

pub use config::{GfxConfig, SlotCapacities, Strictness};
pub use device::RenderDevice;
pub use error::{BackendError, GfxError, GfxResult};
pub use handle::{Handle, ResourceKind};
