use thiserror::Error;

use crate::handle::{Handle, ResourceKind};

/// Errors surfaced by the graphics command layer.
///
/// In [`Strictness::Lenient`](crate::config::Strictness) mode most of these are
/// logged and swallowed; the frame continues in a degraded state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GfxError {
    #[error("no free {kind} slots (capacity {capacity})")]
    SlotsExhausted { kind: ResourceKind, capacity: u16 },

    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    #[error("handle {handle} used where a {expected} was expected")]
    WrongKind { handle: Handle, expected: ResourceKind },

    #[error("view {view} out of range (max {max})")]
    InvalidView { view: u8, max: u8 },

    #[error("vertex stream {stream} out of range (max {max})")]
    InvalidStream { stream: u8, max: u8 },

    #[error("texture stage {stage} out of range (max {max})")]
    InvalidStage { stage: u8, max: u8 },

    #[error("uniform buffer overflow: {requested} bytes requested, limit is {capacity}")]
    UniformOverflow { requested: usize, capacity: usize },

    #[error("uniform {handle} expects {expected} bytes, got {actual}")]
    UniformSizeMismatch {
        handle: Handle,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Failure reported by a [`GraphicsBackend`](crate::backend::GraphicsBackend) while
/// creating a native object.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    #[error("uniform `{0}` not found in program")]
    UniformNotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("native object creation failed: {0}")]
    Creation(String),
}

pub type GfxResult<T> = Result<T, GfxError>;
