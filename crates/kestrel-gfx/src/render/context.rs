use crate::backend::{GraphicsBackend, NativeId};
use crate::config::{MAX_TEXTURE_STAGES, MAX_VERTEX_STREAMS};
use crate::handle::{Handle, ResourceKind};
use crate::logging::DebugFlags;
use crate::queue::{DrawCall, Frame, RenderState, SortKey, Stencil};
use crate::resource::ResourceManager;

use super::stats::ReplayStats;

/// A handle as last bound, with the native id it resolved to.
///
/// When a handle fails lookup or is inert, `handle` records the request while
/// `native` keeps whatever was bound before, so the failure is reported once
/// and later draws reuse the previous binding.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Bound {
    handle: Handle,
    native: NativeId,
}

impl Bound {
    const fn unbound(kind: ResourceKind) -> Self {
        Self {
            handle: Handle::invalid(kind),
            native: NativeId::NONE,
        }
    }
}

/// What replay believes the native API currently has bound.
#[derive(Debug, Clone)]
struct Shadow {
    state: RenderState,
    stencil: Stencil,
    scissor: u16,
    program: Bound,
    index: Bound,
    streams: [Bound; MAX_VERTEX_STREAMS],
    textures: [(Handle, Handle); MAX_TEXTURE_STAGES],
}

impl Shadow {
    /// Matches what [`GraphicsBackend::begin_frame`] resets the backend to.
    fn sentinel() -> Self {
        Self {
            state: RenderState::DEFAULT,
            stencil: Stencil::DISABLED,
            scissor: 0,
            program: Bound::unbound(ResourceKind::Program),
            index: Bound::unbound(ResourceKind::IndexBuffer),
            streams: [Bound::unbound(ResourceKind::VertexBuffer); MAX_VERTEX_STREAMS],
            textures: [(
                Handle::invalid(ResourceKind::Uniform),
                Handle::invalid(ResourceKind::Texture),
            ); MAX_TEXTURE_STAGES],
        }
    }
}

/// Replay side of the command layer.
///
/// Walks a sorted [`Frame`] and issues the smallest set of backend calls that
/// moves the native state from one draw to the next. Nothing here aborts a
/// frame: invalid handles are logged and their bind step skipped.
#[derive(Debug)]
pub struct RenderContext {
    shadow: Shadow,
    stats: ReplayStats,
    debug: DebugFlags,
}

impl RenderContext {
    pub fn new(debug: DebugFlags) -> Self {
        Self {
            shadow: Shadow::sentinel(),
            stats: ReplayStats::default(),
            debug,
        }
    }

    #[inline]
    pub fn set_debug(&mut self, debug: DebugFlags) {
        self.debug = debug;
    }

    /// Replays `frame` in sort order. The frame is sorted first if needed.
    ///
    /// Resources are read, never mutated; frees queued in the frame are the
    /// caller's to execute afterwards.
    pub fn replay<B: GraphicsBackend>(
        &mut self,
        frame: &Frame,
        resources: &ResourceManager,
        backend: &mut B,
    ) -> ReplayStats {
        self.shadow = Shadow::sentinel();
        self.stats = ReplayStats::default();

        if !frame.is_sorted() {
            log::warn!("replaying an unsorted frame; draws run in submission order");
        }

        backend.begin_frame(RenderState::DEFAULT);
        for (key, draw) in frame.iter_sorted() {
            if self.debug.contains(DebugFlags::REPLAY) {
                log::trace!("replay {:?} program {}", SortKey::decode(key), draw.program);
            }
            self.replay_draw(frame, draw, resources, backend);
        }
        backend.end_frame();

        self.stats
    }

    fn replay_draw<B: GraphicsBackend>(
        &mut self,
        frame: &Frame,
        draw: &DrawCall,
        resources: &ResourceManager,
        backend: &mut B,
    ) {
        self.apply_scissor(frame, draw, backend);
        self.apply_stencil(draw, backend);
        self.apply_state(draw.state, backend);
        let program_changed = self.apply_program(draw.program, resources, backend);
        self.apply_uniforms(frame, draw, resources, backend);

        if draw.is_touch() {
            self.stats.touches += 1;
            return;
        }

        if self.shadow.program.native.is_none() {
            self.stats.skipped_draws += 1;
            return;
        }

        self.bind_textures(draw, program_changed, resources, backend);
        self.bind_vertex_streams(draw, program_changed, resources, backend);

        let primitive = draw.state.primitive();
        if draw.is_indexed() {
            self.bind_index_buffer(draw, resources, backend);
            backend.draw_indexed(primitive, draw.index.first, draw.index.count, draw.streams[0].first);
        } else {
            backend.draw(primitive, draw.streams[0].first, draw.vertex_count());
        }
        self.stats.draw_calls += 1;
    }

    // ── fixed-function state ──────────────────────────────────────────────

    fn apply_scissor<B: GraphicsBackend>(&mut self, frame: &Frame, draw: &DrawCall, backend: &mut B) {
        if draw.scissor == self.shadow.scissor {
            return;
        }
        self.shadow.scissor = draw.scissor;
        backend.set_scissor(frame.scissor(draw.scissor));
        self.stats.scissor_changes += 1;
    }

    fn apply_stencil<B: GraphicsBackend>(&mut self, draw: &DrawCall, backend: &mut B) {
        if draw.stencil.bits() ^ self.shadow.stencil.bits() == 0 {
            return;
        }
        self.shadow.stencil = draw.stencil;
        backend.set_stencil(draw.stencil.decode());
        self.stats.stencil_changes += 1;
    }

    /// Issues one call per changed bit group of the state word.
    fn apply_state<B: GraphicsBackend>(&mut self, state: RenderState, backend: &mut B) {
        let changed = state.bits() ^ self.shadow.state.bits();
        if changed == 0 {
            return;
        }

        if changed & RenderState::DEPTH_WRITE != 0 {
            backend.set_depth_write(state.depth_write());
            self.stats.state_changes += 1;
        }
        if changed & RenderState::DEPTH_TEST_MASK != 0 {
            backend.set_depth_test(state.depth_test());
            self.stats.state_changes += 1;
        }
        if changed & RenderState::COLOR_MASK != 0 {
            backend.set_color_mask(state.color_mask());
            self.stats.state_changes += 1;
        }
        if changed & RenderState::BLEND_MASK != 0 {
            backend.set_blend(state.blend());
            self.stats.state_changes += 1;
        }
        if changed & RenderState::PRIMITIVE_MASK != 0 {
            backend.set_primitive(state.primitive());
            self.stats.state_changes += 1;
        }

        self.shadow.state = state;
    }

    // ── program and uniforms ──────────────────────────────────────────────

    /// Returns `true` when the bound program changed.
    fn apply_program<B: GraphicsBackend>(
        &mut self,
        program: Handle,
        resources: &ResourceManager,
        backend: &mut B,
    ) -> bool {
        if program == self.shadow.program.handle {
            return false;
        }

        let native = if program.is_valid() {
            match resources.lookup_program(program) {
                Some(record) => record.native,
                None => {
                    self.report_invalid(program, "program");
                    NativeId::NONE
                }
            }
        } else {
            NativeId::NONE
        };

        if !native.is_none() {
            backend.use_program(native);
            self.stats.program_binds += 1;
        }
        self.shadow.program = Bound {
            handle: program,
            native,
        };
        true
    }

    fn apply_uniforms<B: GraphicsBackend>(
        &mut self,
        frame: &Frame,
        draw: &DrawCall,
        resources: &ResourceManager,
        backend: &mut B,
    ) {
        let begin = draw.uniform_begin as usize;
        let end = draw.uniform_end as usize;

        for (opcode, payload) in frame.uniforms().entries(begin, end) {
            let handle = Handle::new(ResourceKind::Uniform, opcode.slot as u16);
            let Some(ty) = opcode.uniform_type() else {
                log::warn!("uniform stream: unknown type {:#04x} for {handle}", opcode.ty);
                continue;
            };
            let Some(record) = resources.lookup_uniform(handle) else {
                self.report_invalid(handle, "uniform");
                continue;
            };
            if record.native.is_none() {
                continue;
            }
            backend.set_uniform(record.native, ty, opcode.count, payload);
            self.stats.uniform_writes += 1;
        }
    }

    // ── bindings ──────────────────────────────────────────────────────────

    fn bind_textures<B: GraphicsBackend>(
        &mut self,
        draw: &DrawCall,
        program_changed: bool,
        resources: &ResourceManager,
        backend: &mut B,
    ) {
        for (stage, binding) in draw.textures.iter().enumerate() {
            let current = (binding.sampler, binding.texture);
            if !program_changed && self.shadow.textures[stage] == current {
                continue;
            }
            self.shadow.textures[stage] = current;

            if !binding.is_bound() {
                continue;
            }

            let Some(texture) = resources.lookup_texture(binding.texture) else {
                self.report_invalid(binding.texture, "texture");
                continue;
            };
            let sampler = if binding.sampler.is_valid() {
                match resources.lookup_uniform(binding.sampler) {
                    Some(record) => record.native,
                    None => {
                        self.report_invalid(binding.sampler, "sampler uniform");
                        NativeId::NONE
                    }
                }
            } else {
                NativeId::NONE
            };

            if texture.native.is_none() {
                continue;
            }
            backend.bind_texture(stage as u8, sampler, texture.native);
            self.stats.texture_binds += 1;
        }
    }

    /// A stream that fails lookup keeps its previous native binding.
    fn bind_vertex_streams<B: GraphicsBackend>(
        &mut self,
        draw: &DrawCall,
        program_changed: bool,
        resources: &ResourceManager,
        backend: &mut B,
    ) {
        for (stream, binding) in draw.streams.iter().enumerate() {
            if !binding.is_bound() {
                continue;
            }

            let previous = self.shadow.streams[stream];
            if !program_changed && previous.handle == binding.handle {
                continue;
            }

            let native = match resources.lookup_vertex_buffer(binding.handle) {
                Some(record) if !record.native.is_none() => {
                    backend.bind_vertex_buffer(stream as u8, record.native, &record.layout);
                    self.stats.vertex_binds += 1;
                    record.native
                }
                Some(_) => previous.native,
                None => {
                    self.report_invalid(binding.handle, "vertex buffer");
                    previous.native
                }
            };

            self.shadow.streams[stream] = Bound {
                handle: binding.handle,
                native,
            };
        }
    }

    fn bind_index_buffer<B: GraphicsBackend>(
        &mut self,
        draw: &DrawCall,
        resources: &ResourceManager,
        backend: &mut B,
    ) {
        let handle = draw.index.handle;
        let previous = self.shadow.index;
        if previous.handle == handle {
            return;
        }

        let native = match resources.lookup_index_buffer(handle) {
            Some(record) if !record.native.is_none() => {
                backend.bind_index_buffer(record.native, record.format);
                self.stats.index_binds += 1;
                record.native
            }
            Some(_) => previous.native,
            None => {
                self.report_invalid(handle, "index buffer");
                previous.native
            }
        };

        self.shadow.index = Bound { handle, native };
    }

    fn report_invalid(&mut self, handle: Handle, role: &str) {
        self.stats.invalid_handles += 1;
        if self.stats.invalid_handles == 1 {
            log::warn!("replay: invalid {role} handle {handle}; bind skipped");
        } else if self.debug.contains(DebugFlags::HANDLES) {
            log::warn!("replay: invalid {role} handle {handle}");
        }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(DebugFlags::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, RecordingBackend};
    use crate::config::{GfxConfig, Strictness};
    use crate::queue::{BlendMode, RenderQueue, ScissorRect, UniformType};
    use crate::resource::{Image, IndexFormat, SamplerDesc, VertexLayout};

    struct Harness {
        backend: RecordingBackend,
        resources: ResourceManager,
        queue: RenderQueue,
        context: RenderContext,
        config: GfxConfig,
    }

    impl Harness {
        fn new() -> Self {
            let config = GfxConfig::default();
            Self {
                backend: RecordingBackend::new(),
                resources: ResourceManager::new(&config.slots, Strictness::Lenient, config.debug),
                queue: RenderQueue::new(&config),
                context: RenderContext::default(),
                config,
            }
        }

        fn program(&mut self) -> Handle {
            self.resources.alloc_program(&mut self.backend, "vs", "fs").unwrap()
        }

        fn quad(&mut self) -> (Handle, Handle) {
            let vb = self
                .resources
                .alloc_vertex_buffer(&mut self.backend, &[0; 80], VertexLayout::with_stride(20))
                .unwrap();
            let ib = self
                .resources
                .alloc_index_buffer(&mut self.backend, &[0; 12], IndexFormat::U16)
                .unwrap();
            (vb, ib)
        }

        fn texture(&mut self) -> Handle {
            let pixels = [255u8; 4];
            self.resources
                .alloc_texture(&mut self.backend, &Image::rgba8(1, 1, &pixels), SamplerDesc::default())
                .unwrap()
        }

        fn set_quad(&mut self, (vb, ib): (Handle, Handle)) {
            self.queue.set_vertex_buffer(0, vb, 0, 4).unwrap();
            self.queue.set_index_buffer(ib, 0, 6).unwrap();
        }

        fn flush(&mut self) -> ReplayStats {
            let frame = self.queue.end_frame(Frame::new(&self.config));
            self.backend.clear();
            self.context.replay(&frame, &self.resources, &mut self.backend)
        }
    }

    // ── diffing ───────────────────────────────────────────────────────────

    #[test]
    fn identical_state_issues_no_state_calls_between_draws() {
        let mut h = Harness::new();
        let program = h.program();
        let quad = h.quad();
        let state = RenderState::DEFAULT.with_blend(BlendMode::Additive);

        for _ in 0..3 {
            h.queue.set_state(state);
            h.set_quad(quad);
            h.queue.submit(0, program, 0, false).unwrap();
        }
        let stats = h.flush();

        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.state_changes, 1);
        assert_eq!(stats.program_binds, 1);
        assert_eq!(stats.vertex_binds, 1);
        assert_eq!(stats.index_binds, 1);

        let calls = h.backend.last_frame();
        let first_draw = calls.iter().position(BackendCall::is_draw).unwrap();
        assert!(calls[first_draw..].iter().all(|c| !c.is_state_change()));
    }

    #[test]
    fn only_changed_groups_are_issued() {
        let mut h = Harness::new();
        let program = h.program();
        let quad = h.quad();

        h.queue.set_state(RenderState::DEFAULT);
        h.set_quad(quad);
        h.queue.submit(0, program, 0, false).unwrap();
        h.queue.set_state(RenderState::DEFAULT.with_depth_write(true));
        h.set_quad(quad);
        h.queue.submit(0, program, 1, false).unwrap();
        h.flush();

        let state_calls: Vec<&BackendCall> =
            h.backend.calls().iter().filter(|c| c.is_state_change()).collect();
        assert_eq!(state_calls, vec![&BackendCall::SetDepthWrite(true)]);
    }

    #[test]
    fn scissor_and_stencil_follow_their_own_diff() {
        let mut h = Harness::new();
        let program = h.program();
        let quad = h.quad();
        let rect = ScissorRect::new(0, 0, 32, 32);

        h.queue.set_scissor(rect);
        h.set_quad(quad);
        h.queue.submit(0, program, 0, false).unwrap();
        h.queue.set_scissor(rect);
        h.set_quad(quad);
        h.queue.submit(0, program, 1, false).unwrap();
        h.set_quad(quad);
        h.queue.submit(0, program, 2, false).unwrap();
        let stats = h.flush();

        assert_eq!(stats.scissor_changes, 2);
        assert_eq!(stats.stencil_changes, 0);
        let scissors: Vec<&BackendCall> = h
            .backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::SetScissor(_)))
            .collect();
        assert_eq!(
            scissors,
            vec![&BackendCall::SetScissor(Some(rect)), &BackendCall::SetScissor(None)]
        );
    }

    // ── rebinding ─────────────────────────────────────────────────────────

    #[test]
    fn program_change_forces_texture_and_stream_rebind() {
        let mut h = Harness::new();
        let program_a = h.program();
        let program_b = h.program();
        let quad = h.quad();
        let texture = h.texture();
        let sampler = h
            .resources
            .alloc_uniform(&mut h.backend, program_a, "s_tex", UniformType::Sampler, 1)
            .unwrap();

        for program in [program_a, program_b] {
            h.set_quad(quad);
            h.queue.set_texture(0, sampler, texture).unwrap();
            h.queue.submit(0, program, 0, false).unwrap();
        }
        let stats = h.flush();

        assert_eq!(stats.program_binds, 2);
        assert_eq!(stats.texture_binds, 2);
        assert_eq!(stats.vertex_binds, 2);
        // Index buffers are not program-relative.
        assert_eq!(stats.index_binds, 1);
    }

    #[test]
    fn uniform_range_is_replayed_before_the_draw() {
        let mut h = Harness::new();
        let program = h.program();
        let quad = h.quad();
        let color = h
            .resources
            .alloc_uniform(&mut h.backend, program, "u_color", UniformType::Vec4, 1)
            .unwrap();
        let native = h.resources.lookup_uniform(color).unwrap().native;

        let rgba: [f32; 4] = [1.0, 0.5, 0.25, 1.0];
        h.queue
            .set_uniform(color, UniformType::Vec4, 1, bytemuck::cast_slice(&rgba))
            .unwrap();
        h.set_quad(quad);
        h.queue.submit(0, program, 0, false).unwrap();
        let stats = h.flush();

        assert_eq!(stats.uniform_writes, 1);
        let calls = h.backend.last_frame();
        let set = calls
            .iter()
            .position(|c| matches!(c, BackendCall::SetUniform { .. }))
            .unwrap();
        let draw = calls.iter().position(BackendCall::is_draw).unwrap();
        assert!(set < draw);
        assert_eq!(
            calls[set],
            BackendCall::SetUniform {
                uniform: native,
                ty: UniformType::Vec4,
                count: 1,
                data: bytemuck::cast_slice::<f32, u8>(&rgba).to_vec(),
            }
        );
    }

    // ── degraded input ────────────────────────────────────────────────────

    #[test]
    fn inert_program_skips_the_draw() {
        let mut h = Harness::new();
        h.backend.reject_programs = true;
        let program = h.program();
        h.backend.reject_programs = false;
        let quad = h.quad();

        h.set_quad(quad);
        h.queue.submit(0, program, 0, false).unwrap();
        let stats = h.flush();

        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.skipped_draws, 1);
        assert_eq!(stats.invalid_handles, 0);
    }

    #[test]
    fn stale_vertex_buffer_skips_the_bind_but_still_draws() {
        let mut h = Harness::new();
        let program = h.program();
        let (vb, ib) = h.quad();
        let stale = Handle::new(ResourceKind::VertexBuffer, 77);

        h.set_quad((vb, ib));
        h.queue.submit(0, program, 0, false).unwrap();
        h.queue.set_vertex_buffer(0, stale, 0, 4).unwrap();
        h.queue.set_index_buffer(ib, 0, 6).unwrap();
        h.queue.submit(0, program, 1, false).unwrap();
        let stats = h.flush();

        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.skipped_draws, 0);
        assert!(stats.invalid_handles >= 1);
        // The second draw runs against the buffer bound by the first.
        assert_eq!(stats.vertex_binds, 1);
        assert_eq!(h.backend.count(BackendCall::is_draw), 2);
    }

    #[test]
    fn repeated_stale_index_buffer_is_reported_once() {
        let mut h = Harness::new();
        let program = h.program();
        let (vb, _) = h.quad();
        let stale = Handle::new(ResourceKind::IndexBuffer, 88);

        for depth in 0..3 {
            h.queue.set_vertex_buffer(0, vb, 0, 4).unwrap();
            h.queue.set_index_buffer(stale, 0, 6).unwrap();
            h.queue.submit(0, program, depth, false).unwrap();
        }
        let stats = h.flush();

        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.invalid_handles, 1);
        assert_eq!(stats.index_binds, 0);
    }

    #[test]
    fn touch_applies_state_but_draws_nothing() {
        let mut h = Harness::new();
        h.queue.set_state(RenderState::DEFAULT.with_blend(BlendMode::Replace));
        h.queue.touch(2).unwrap();
        let stats = h.flush();

        assert_eq!(stats.touches, 1);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.state_changes, 1);
        assert_eq!(h.backend.count(BackendCall::is_draw), 0);
    }

    #[test]
    fn non_indexed_draw_uses_stream_range() {
        let mut h = Harness::new();
        let program = h.program();
        let (vb, _) = h.quad();

        h.queue.set_vertex_buffer(0, vb, 2, 3).unwrap();
        h.queue.submit(0, program, 0, false).unwrap();
        h.flush();

        assert!(h.backend.calls().contains(&BackendCall::Draw {
            primitive: crate::queue::PrimitiveType::Triangles,
            first_vertex: 2,
            vertex_count: 3,
        }));
    }
}
