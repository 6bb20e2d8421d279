//! GPU resource records and their allocator.
//!
//! Responsibilities:
//! - describe resources at creation time (`desc`)
//! - own one fixed-capacity record table per resource kind
//! - resolve handles to records, rejecting wrong-kind and stale handles

mod desc;
mod manager;
mod records;

pub use desc::{
    FilterMode, Image, IndexFormat, SamplerDesc, TextureFormat, VertexAttribute, VertexFormat,
    VertexLayout, WrapMode,
};
pub use manager::ResourceManager;
pub use records::{
    IndexBufferRecord, ProgramRecord, TextureRecord, UniformRecord, VertexBufferRecord,
};
