//! Replay of sorted frames against a [`GraphicsBackend`](crate::backend::GraphicsBackend).
//!
//! [`RenderContext`] keeps a shadow copy of the native state and only issues
//! calls for what differs between consecutive draws. [`ReplayStats`] reports
//! what was issued.

mod context;
mod stats;

pub use context::RenderContext;
pub use stats::ReplayStats;
