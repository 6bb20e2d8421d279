use crate::error::BackendError;
use crate::handle::ResourceKind;
use crate::queue::{
    BlendMode, ColorMask, CompareFunc, PrimitiveType, RenderState, ScissorRect, StencilState,
    UniformType,
};
use crate::resource::{Image, IndexFormat, SamplerDesc, VertexLayout};

use super::{GraphicsBackend, NativeId};

/// One native call, as seen by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateIndexBuffer { id: NativeId, bytes: usize, format: IndexFormat },
    CreateVertexBuffer { id: NativeId, bytes: usize, stride: u32 },
    CreateTexture { id: NativeId, width: u32, height: u32 },
    CreateProgram { id: NativeId },
    CreateUniform { id: NativeId, program: NativeId, name: String },
    Destroy { kind: ResourceKind, id: NativeId },

    BeginFrame,
    EndFrame,

    SetScissor(Option<ScissorRect>),
    SetStencil(Option<StencilState>),
    SetDepthWrite(bool),
    SetDepthTest(Option<CompareFunc>),
    SetColorMask(ColorMask),
    SetBlend(BlendMode),
    SetPrimitive(PrimitiveType),
    UseProgram(NativeId),
    SetUniform { uniform: NativeId, ty: UniformType, count: u8, data: Vec<u8> },
    BindTexture { stage: u8, sampler: NativeId, texture: NativeId },
    BindIndexBuffer(NativeId),
    BindVertexBuffer { stream: u8, buffer: NativeId },

    DrawIndexed { primitive: PrimitiveType, first_index: u32, index_count: u32, base_vertex: u32 },
    Draw { primitive: PrimitiveType, first_vertex: u32, vertex_count: u32 },
}

impl BackendCall {
    /// State transitions diffed from the render-state word, stencil or scissor.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            BackendCall::SetScissor(_)
                | BackendCall::SetStencil(_)
                | BackendCall::SetDepthWrite(_)
                | BackendCall::SetDepthTest(_)
                | BackendCall::SetColorMask(_)
                | BackendCall::SetBlend(_)
                | BackendCall::SetPrimitive(_)
        )
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, BackendCall::DrawIndexed { .. } | BackendCall::Draw { .. })
    }
}

/// Backend that performs no GPU work and logs every call.
///
/// Native ids are handed out sequentially from 1. Program creation can be
/// forced to fail to exercise the inert-resource path.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub(crate) calls: Vec<BackendCall>,
    pub(crate) next_id: u32,
    /// When set, `create_program` fails with a compile error.
    pub reject_programs: bool,
    /// When set, `create_uniform` fails as if the name were missing from the program.
    pub reject_uniforms: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Returns and clears the call log.
    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Calls issued between the last `BeginFrame` and its `EndFrame` (or the end of the log).
    pub fn last_frame(&self) -> &[BackendCall] {
        let start = self
            .calls
            .iter()
            .rposition(|c| *c == BackendCall::BeginFrame)
            .map_or(0, |i| i + 1);
        let end = self.calls[start..]
            .iter()
            .position(|c| *c == BackendCall::EndFrame)
            .map_or(self.calls.len(), |i| start + i);
        &self.calls[start..end]
    }

    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    fn issue_id(&mut self) -> NativeId {
        self.next_id += 1;
        NativeId(self.next_id)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn create_index_buffer(
        &mut self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<NativeId, BackendError> {
        let id = self.issue_id();
        self.calls.push(BackendCall::CreateIndexBuffer {
            id,
            bytes: data.len(),
            format,
        });
        Ok(id)
    }

    fn create_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<NativeId, BackendError> {
        let id = self.issue_id();
        self.calls.push(BackendCall::CreateVertexBuffer {
            id,
            bytes: data.len(),
            stride: layout.stride,
        });
        Ok(id)
    }

    fn create_texture(
        &mut self,
        image: &Image<'_>,
        _sampler: SamplerDesc,
    ) -> Result<NativeId, BackendError> {
        let id = self.issue_id();
        self.calls.push(BackendCall::CreateTexture {
            id,
            width: image.width,
            height: image.height,
        });
        Ok(id)
    }

    fn create_program(
        &mut self,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> Result<NativeId, BackendError> {
        if self.reject_programs {
            return Err(BackendError::ShaderCompile("rejected by recording backend".into()));
        }
        let id = self.issue_id();
        self.calls.push(BackendCall::CreateProgram { id });
        Ok(id)
    }

    fn create_uniform(
        &mut self,
        program: NativeId,
        name: &str,
        _ty: UniformType,
        _count: u8,
    ) -> Result<NativeId, BackendError> {
        if self.reject_uniforms {
            return Err(BackendError::UniformNotFound(name.to_string()));
        }
        let id = self.issue_id();
        self.calls.push(BackendCall::CreateUniform {
            id,
            program,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn destroy(&mut self, kind: ResourceKind, id: NativeId) {
        self.calls.push(BackendCall::Destroy { kind, id });
    }

    fn begin_frame(&mut self, _defaults: RenderState) {
        self.calls.push(BackendCall::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.calls.push(BackendCall::EndFrame);
    }

    fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        self.calls.push(BackendCall::SetScissor(rect));
    }

    fn set_stencil(&mut self, stencil: Option<StencilState>) {
        self.calls.push(BackendCall::SetStencil(stencil));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.calls.push(BackendCall::SetDepthWrite(enabled));
    }

    fn set_depth_test(&mut self, func: Option<CompareFunc>) {
        self.calls.push(BackendCall::SetDepthTest(func));
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.calls.push(BackendCall::SetColorMask(mask));
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.calls.push(BackendCall::SetBlend(mode));
    }

    fn set_primitive(&mut self, primitive: PrimitiveType) {
        self.calls.push(BackendCall::SetPrimitive(primitive));
    }

    fn use_program(&mut self, program: NativeId) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn set_uniform(&mut self, uniform: NativeId, ty: UniformType, count: u8, data: &[u8]) {
        self.calls.push(BackendCall::SetUniform {
            uniform,
            ty,
            count,
            data: data.to_vec(),
        });
    }

    fn bind_texture(&mut self, stage: u8, sampler: NativeId, texture: NativeId) {
        self.calls.push(BackendCall::BindTexture {
            stage,
            sampler,
            texture,
        });
    }

    fn bind_index_buffer(&mut self, buffer: NativeId, _format: IndexFormat) {
        self.calls.push(BackendCall::BindIndexBuffer(buffer));
    }

    fn bind_vertex_buffer(&mut self, stream: u8, buffer: NativeId, _layout: &VertexLayout) {
        self.calls.push(BackendCall::BindVertexBuffer { stream, buffer });
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
        base_vertex: u32,
    ) {
        self.calls.push(BackendCall::DrawIndexed {
            primitive,
            first_index,
            index_count,
            base_vertex,
        });
    }

    fn draw(&mut self, primitive: PrimitiveType, first_vertex: u32, vertex_count: u32) {
        self.calls.push(BackendCall::Draw {
            primitive,
            first_vertex,
            vertex_count,
        });
    }
}
