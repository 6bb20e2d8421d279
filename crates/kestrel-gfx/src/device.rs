//! The public submission API.
//!
//! [`RenderDevice`] owns the resource tables, the queue, the replay context and
//! the backend. One device per native context; nothing is global.

use crate::backend::GraphicsBackend;
use crate::config::GfxConfig;
use crate::error::{GfxError, GfxResult};
use crate::handle::{Handle, ResourceKind};
use crate::queue::{
    Frame, RenderQueue, RenderState, ScissorRect, Stencil, UniformType, ViewMode,
};
use crate::render::{RenderContext, ReplayStats};
use crate::resource::{Image, IndexFormat, ResourceManager, SamplerDesc, VertexLayout};

/// Graphics command layer bound to one backend.
///
/// Typical frame:
///
/// ```ignore
/// device.set_vertex_buffer(0, quad_vb, 0, 4)?;
/// device.set_index_buffer(quad_ib, 0, 6)?;
/// device.set_texture(0, s_texture, atlas)?;
/// device.submit(VIEW_WORLD, sprite_program, depth)?;
/// // ...
/// let draws = device.flush();
/// ```
///
/// Recoverable misuse (bad view, stale handle, uniform overflow) is logged and
/// ignored in [`Strictness::Lenient`](crate::config::Strictness) mode and
/// returned as an error in strict mode.
pub struct RenderDevice<B: GraphicsBackend> {
    config: GfxConfig,
    resources: ResourceManager,
    queue: RenderQueue,
    context: RenderContext,
    backend: B,

    /// Last replayed frame, kept for its allocations.
    spare: Option<Frame>,
    last_stats: ReplayStats,
    last_dropped: u32,
    frame_number: u64,
}

impl<B: GraphicsBackend> RenderDevice<B> {
    pub fn new(config: GfxConfig, backend: B) -> GfxResult<Self> {
        config.validate()?;

        let resources = ResourceManager::new(&config.slots, config.strictness, config.debug);
        let queue = RenderQueue::new(&config);
        let context = RenderContext::new(config.debug);

        log::debug!(
            "render device: {} draws/frame, {} views, {:?}",
            config.max_draw_calls,
            config.max_views,
            config.strictness
        );

        Ok(Self {
            resources,
            queue,
            context,
            backend,
            spare: None,
            last_stats: ReplayStats::default(),
            last_dropped: 0,
            frame_number: 0,
            config,
        })
    }

    #[inline]
    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    #[inline]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Frames flushed so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Frame currently being recorded.
    #[inline]
    pub fn pending_frame(&self) -> &Frame {
        self.queue.frame()
    }

    #[inline]
    pub fn last_frame_stats(&self) -> ReplayStats {
        self.last_stats
    }

    /// Draws dropped by the last flushed frame.
    #[inline]
    pub fn last_frame_dropped(&self) -> u32 {
        self.last_dropped
    }

    // ── resources ─────────────────────────────────────────────────────────

    pub fn alloc_index_buffer(&mut self, data: &[u8], format: IndexFormat) -> GfxResult<Handle> {
        self.resources.alloc_index_buffer(&mut self.backend, data, format)
    }

    pub fn alloc_vertex_buffer(&mut self, data: &[u8], layout: VertexLayout) -> GfxResult<Handle> {
        self.resources.alloc_vertex_buffer(&mut self.backend, data, layout)
    }

    pub fn alloc_texture(&mut self, image: &Image<'_>, sampler: SamplerDesc) -> GfxResult<Handle> {
        self.resources.alloc_texture(&mut self.backend, image, sampler)
    }

    pub fn alloc_program(&mut self, vertex_src: &str, fragment_src: &str) -> GfxResult<Handle> {
        self.resources.alloc_program(&mut self.backend, vertex_src, fragment_src)
    }

    pub fn alloc_uniform(
        &mut self,
        program: Handle,
        name: &str,
        ty: UniformType,
        count: u8,
    ) -> GfxResult<Handle> {
        self.resources.alloc_uniform(&mut self.backend, program, name, ty, count)
    }

    /// Schedules `handle` for destruction once the frame being recorded has been replayed.
    ///
    /// The handle stays valid for draws already submitted this frame. Its slot is
    /// not reused before the next [`flush`](Self::flush) completes.
    pub fn free(&mut self, handle: Handle) -> GfxResult<()> {
        if !self.resources.is_live(handle) {
            return self.recover(Err(GfxError::InvalidHandle(handle)));
        }
        if self.queue.frame().deferred_frees().contains(&handle) {
            return self.recover(Err(GfxError::InvalidHandle(handle)));
        }
        self.queue.defer_free(handle);
        Ok(())
    }

    // ── pending draw ──────────────────────────────────────────────────────

    pub fn set_state(&mut self, state: RenderState) {
        self.queue.set_state(state);
    }

    pub fn set_stencil(&mut self, stencil: Stencil) {
        self.queue.set_stencil(stencil);
    }

    pub fn set_index_buffer(&mut self, handle: Handle, first: u32, count: u32) -> GfxResult<()> {
        let result = self.queue.set_index_buffer(handle, first, count);
        self.recover(result)
    }

    pub fn set_vertex_buffer(
        &mut self,
        stream: u8,
        handle: Handle,
        first: u32,
        count: u32,
    ) -> GfxResult<()> {
        let result = self.queue.set_vertex_buffer(stream, handle, first, count);
        self.recover(result)
    }

    pub fn set_texture(&mut self, stage: u8, sampler: Handle, texture: Handle) -> GfxResult<()> {
        let result = self.queue.set_texture(stage, sampler, texture);
        self.recover(result)
    }

    /// Writes `data` for `uniform`. The type and element count come from the
    /// uniform's record; `data` must match them exactly.
    pub fn set_uniform(&mut self, uniform: Handle, data: &[u8]) -> GfxResult<()> {
        let result = match self.resources.lookup_uniform(uniform) {
            Some(record) => self.queue.set_uniform(uniform, record.ty, record.count, data),
            None => Err(if uniform.is(ResourceKind::Uniform) {
                GfxError::InvalidHandle(uniform)
            } else {
                GfxError::WrongKind {
                    handle: uniform,
                    expected: ResourceKind::Uniform,
                }
            }),
        };
        self.recover(result)
    }

    /// Typed form of [`set_uniform`](Self::set_uniform).
    pub fn set_uniform_pod<T: bytemuck::Pod>(&mut self, uniform: Handle, value: &[T]) -> GfxResult<()> {
        self.set_uniform(uniform, bytemuck::cast_slice(value))
    }

    pub fn set_scissor(&mut self, rect: ScissorRect) -> u16 {
        self.queue.set_scissor(rect)
    }

    pub fn set_scissor_cached(&mut self, index: u16) {
        self.queue.set_scissor_cached(index);
    }

    pub fn set_view_mode(&mut self, view: u8, mode: ViewMode) -> GfxResult<()> {
        let result = self.queue.set_view_mode(view, mode);
        self.recover(result)
    }

    // ── submission ────────────────────────────────────────────────────────

    /// Submits the pending draw and resets it. Returns the number of draws recorded.
    pub fn submit(&mut self, view: u8, program: Handle, depth: u32) -> GfxResult<u32> {
        self.submit_with(view, program, depth, false)
    }

    /// Like [`submit`](Self::submit); with `preserve_state` the pending draw is kept
    /// for another pass over the same geometry.
    pub fn submit_with(
        &mut self,
        view: u8,
        program: Handle,
        depth: u32,
        preserve_state: bool,
    ) -> GfxResult<u32> {
        let result = self.queue.submit(view, program, depth, preserve_state);
        if result.is_err() {
            self.queue.discard();
        }
        self.recover(result)
    }

    pub fn touch(&mut self, view: u8) -> GfxResult<u32> {
        let result = self.queue.touch(view);
        self.recover(result)
    }

    /// Sorts and replays the recorded frame, then releases its deferred frees.
    ///
    /// Returns the number of draw calls in the replayed frame.
    pub fn flush(&mut self) -> u32 {
        let spare = self.spare.take().unwrap_or_else(|| Frame::new(&self.config));
        let mut frame = self.queue.end_frame(spare);

        self.last_stats = self.context.replay(&frame, &self.resources, &mut self.backend);
        self.last_dropped = frame.dropped();

        for handle in frame.take_deferred_frees() {
            if let Err(err) = self.resources.free(&mut self.backend, handle) {
                log::warn!("deferred free: {err}");
            }
        }

        let count = frame.len() as u32;
        self.spare = Some(frame);
        self.frame_number += 1;
        count
    }

    /// Applies the strictness policy to a recoverable error.
    fn recover<T: Default>(&self, result: GfxResult<T>) -> GfxResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if self.config.strictness.is_strict() => Err(err),
            Err(err) => {
                log::warn!("{err}");
                Ok(T::default())
            }
        }
    }
}

impl<B: GraphicsBackend + std::fmt::Debug> std::fmt::Debug for RenderDevice<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("frame_number", &self.frame_number)
            .field("pending_draws", &self.queue.frame().len())
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::config::Strictness;

    fn device(strictness: Strictness) -> RenderDevice<RecordingBackend> {
        let config = GfxConfig {
            strictness,
            ..Default::default()
        };
        RenderDevice::new(config, RecordingBackend::new()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = GfxConfig {
            max_views: 0,
            ..Default::default()
        };
        assert!(RenderDevice::new(config, RecordingBackend::new()).is_err());
    }

    #[test]
    fn lenient_mode_swallows_bad_view() {
        let mut dev = device(Strictness::Lenient);
        let program = dev.alloc_program("vs", "fs").unwrap();
        assert_eq!(dev.submit(200, program, 0).unwrap(), 0);
        assert!(dev.pending_frame().is_empty());
    }

    #[test]
    fn strict_mode_reports_bad_view() {
        let mut dev = device(Strictness::Strict);
        let program = dev.alloc_program("vs", "fs").unwrap();
        assert_eq!(
            dev.submit(200, program, 0),
            Err(GfxError::InvalidView { view: 200, max: 15 })
        );
    }

    #[test]
    fn uniform_size_comes_from_the_record() {
        let mut dev = device(Strictness::Strict);
        let program = dev.alloc_program("vs", "fs").unwrap();
        let mvp = dev.alloc_uniform(program, "u_mvp", UniformType::Mat4, 1).unwrap();

        let identity: [f32; 16] = core::array::from_fn(|i| if i % 5 == 0 { 1.0 } else { 0.0 });
        dev.set_uniform_pod(mvp, &identity).unwrap();
        assert!(matches!(
            dev.set_uniform_pod(mvp, &[0.0f32; 4]),
            Err(GfxError::UniformSizeMismatch { expected: 64, actual: 16, .. })
        ));
    }

    #[test]
    fn double_free_in_one_frame_is_rejected() {
        let mut dev = device(Strictness::Strict);
        let program = dev.alloc_program("vs", "fs").unwrap();
        dev.free(program).unwrap();
        assert_eq!(dev.free(program), Err(GfxError::InvalidHandle(program)));
    }

    #[test]
    fn flush_counts_frames_and_recycles_the_spare() {
        let mut dev = device(Strictness::Lenient);
        dev.touch(0).unwrap();
        assert_eq!(dev.flush(), 1);
        assert_eq!(dev.flush(), 0);
        assert_eq!(dev.frame_number(), 2);
        assert_eq!(dev.last_frame_stats(), ReplayStats::default());
    }
}
