//! Submission side: per-draw state, sort keys, the uniform stream and frames.
//!
//! Callers mutate a pending [`DrawCall`] through [`RenderQueue`]'s `set_*`
//! methods, then [`RenderQueue::submit`] snapshots it into the current
//! [`Frame`] together with its packed [`SortKey`]. At the frame boundary
//! [`RenderQueue::end_frame`] sorts the frame and hands it to replay.

mod draw;
mod frame;
mod key;
#[allow(clippy::module_inception)]
mod queue;
mod state;
mod uniform;

pub use draw::{BufferBinding, DrawCall, ScissorRect, TextureBinding};
pub use frame::{Frame, ViewMode};
pub use key::SortKey;
pub use queue::RenderQueue;
pub use state::{
    BlendMode, ColorMask, CompareFunc, PrimitiveType, RenderState, Stencil, StencilOp,
    StencilState,
};
pub use uniform::{UniformBuffer, UniformEntries, UniformOpcode, UniformType};
