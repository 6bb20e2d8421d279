//! Native graphics API boundary.
//!
//! [`GraphicsBackend`] is a GL-shaped immediate state machine: replay issues
//! one call per state transition and trusts the backend to apply it. Two
//! implementations ship with the crate:
//! - [`RecordingBackend`]: logs every call, used by tests and headless tooling
//! - [`WgpuBackend`]: folds the state calls into cached wgpu pipelines

mod gpu;
mod recording;

pub use gpu::{WgpuBackend, WgpuInit, WgpuTarget, UNIFORM_BLOCK_LIMIT};
pub use recording::{BackendCall, RecordingBackend};

use crate::error::BackendError;
use crate::handle::ResourceKind;
use crate::queue::{
    BlendMode, ColorMask, CompareFunc, PrimitiveType, RenderState, ScissorRect, StencilState,
    UniformType,
};
use crate::resource::{Image, IndexFormat, SamplerDesc, VertexLayout};

/// Backend-side object id. `NativeId::NONE` marks an inert record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct NativeId(pub u32);

impl NativeId {
    pub const NONE: NativeId = NativeId(0);

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

pub trait GraphicsBackend {
    // ── resources ─────────────────────────────────────────────────────────

    fn create_index_buffer(
        &mut self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<NativeId, BackendError>;

    fn create_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<NativeId, BackendError>;

    fn create_texture(
        &mut self,
        image: &Image<'_>,
        sampler: SamplerDesc,
    ) -> Result<NativeId, BackendError>;

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<NativeId, BackendError>;

    /// Resolves a named uniform inside `program`.
    fn create_uniform(
        &mut self,
        program: NativeId,
        name: &str,
        ty: UniformType,
        count: u8,
    ) -> Result<NativeId, BackendError>;

    fn destroy(&mut self, kind: ResourceKind, id: NativeId);

    // ── frame ─────────────────────────────────────────────────────────────

    /// Starts a frame. The backend resets its own state to `defaults`, no
    /// scissor and no stencil, matching replay's initial shadow state.
    fn begin_frame(&mut self, defaults: RenderState);

    fn end_frame(&mut self);

    // ── state ─────────────────────────────────────────────────────────────

    /// `None` disables the scissor test.
    fn set_scissor(&mut self, rect: Option<ScissorRect>);

    /// `None` disables the stencil test.
    fn set_stencil(&mut self, stencil: Option<StencilState>);

    fn set_depth_write(&mut self, enabled: bool);

    /// `None` disables the depth test.
    fn set_depth_test(&mut self, func: Option<CompareFunc>);

    fn set_color_mask(&mut self, mask: ColorMask);

    fn set_blend(&mut self, mode: BlendMode);

    fn set_primitive(&mut self, primitive: PrimitiveType);

    fn use_program(&mut self, program: NativeId);

    fn set_uniform(&mut self, uniform: NativeId, ty: UniformType, count: u8, data: &[u8]);

    /// Binds `texture` to `stage` and points the `sampler` uniform at it.
    fn bind_texture(&mut self, stage: u8, sampler: NativeId, texture: NativeId);

    fn bind_index_buffer(&mut self, buffer: NativeId, format: IndexFormat);

    fn bind_vertex_buffer(&mut self, stream: u8, buffer: NativeId, layout: &VertexLayout);

    // ── draws ─────────────────────────────────────────────────────────────

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
        base_vertex: u32,
    );

    fn draw(&mut self, primitive: PrimitiveType, first_vertex: u32, vertex_count: u32);
}
