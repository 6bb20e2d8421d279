use crate::config::{GfxConfig, MAX_TEXTURE_STAGES, MAX_VERTEX_STREAMS};
use crate::error::{GfxError, GfxResult};
use crate::handle::{Handle, ResourceKind};
use crate::logging::DebugFlags;

use super::draw::{BufferBinding, DrawCall, ScissorRect, TextureBinding};
use super::frame::{Frame, ViewMode};
use super::key::SortKey;
use super::state::{RenderState, Stencil};
use super::uniform::{UniformOpcode, UniformType};

/// Submission side of the command layer.
///
/// Holds one pending [`DrawCall`] that the `set_*` calls mutate, and the
/// frame that [`submit`](RenderQueue::submit) appends snapshots to.
///
/// The queue validates handle *kinds* only; whether a handle is live is
/// checked at replay.
#[derive(Debug)]
pub struct RenderQueue {
    frame: Frame,
    pending: DrawCall,
    /// Start of the pending draw's uniform range.
    uniform_begin: usize,

    view_modes: Vec<ViewMode>,
    view_seq: Vec<u32>,
    max_views: u8,

    debug: DebugFlags,
}

impl RenderQueue {
    pub fn new(config: &GfxConfig) -> Self {
        let views = config.max_views as usize;
        Self {
            frame: Frame::new(config),
            pending: DrawCall::EMPTY,
            uniform_begin: 0,
            view_modes: vec![ViewMode::default(); views],
            view_seq: vec![0; views],
            max_views: config.max_views,
            debug: config.debug,
        }
    }

    /// Frame currently being recorded.
    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    #[inline]
    pub fn pending(&self) -> &DrawCall {
        &self.pending
    }

    // ── views ─────────────────────────────────────────────────────────────

    pub fn set_view_mode(&mut self, view: u8, mode: ViewMode) -> GfxResult<()> {
        self.check_view(view)?;
        self.view_modes[view as usize] = mode;
        Ok(())
    }

    pub fn view_mode(&self, view: u8) -> Option<ViewMode> {
        self.view_modes.get(view as usize).copied()
    }

    fn check_view(&self, view: u8) -> GfxResult<()> {
        if view < self.max_views {
            Ok(())
        } else {
            Err(GfxError::InvalidView {
                view,
                max: self.max_views - 1,
            })
        }
    }

    // ── pending draw ──────────────────────────────────────────────────────

    pub fn set_state(&mut self, state: RenderState) {
        self.pending.state = state;
    }

    pub fn set_stencil(&mut self, stencil: Stencil) {
        self.pending.stencil = stencil;
    }

    pub fn set_index_buffer(&mut self, handle: Handle, first: u32, count: u32) -> GfxResult<()> {
        expect_kind(handle, ResourceKind::IndexBuffer)?;
        self.pending.index = BufferBinding {
            handle,
            first,
            count,
        };
        Ok(())
    }

    pub fn set_vertex_buffer(
        &mut self,
        stream: u8,
        handle: Handle,
        first: u32,
        count: u32,
    ) -> GfxResult<()> {
        if stream as usize >= MAX_VERTEX_STREAMS {
            return Err(GfxError::InvalidStream {
                stream,
                max: MAX_VERTEX_STREAMS as u8 - 1,
            });
        }
        expect_kind(handle, ResourceKind::VertexBuffer)?;
        self.pending.streams[stream as usize] = BufferBinding {
            handle,
            first,
            count,
        };
        Ok(())
    }

    /// Binds `texture` to `stage`. `sampler` is the uniform that selects the stage in
    /// the shader; pass an invalid uniform handle if the program has none.
    pub fn set_texture(&mut self, stage: u8, sampler: Handle, texture: Handle) -> GfxResult<()> {
        if stage as usize >= MAX_TEXTURE_STAGES {
            return Err(GfxError::InvalidStage {
                stage,
                max: MAX_TEXTURE_STAGES as u8 - 1,
            });
        }
        expect_kind(sampler, ResourceKind::Uniform)?;
        expect_kind(texture, ResourceKind::Texture)?;
        self.pending.textures[stage as usize] = TextureBinding { sampler, texture };
        Ok(())
    }

    /// Appends a uniform value to the frame's uniform stream.
    ///
    /// `payload` must hold exactly `ty.size() * count` bytes.
    pub fn set_uniform(
        &mut self,
        uniform: Handle,
        ty: UniformType,
        count: u8,
        payload: &[u8],
    ) -> GfxResult<()> {
        expect_kind(uniform, ResourceKind::Uniform)?;
        let opcode = UniformOpcode::new(ty, uniform.slot() as u8, count);
        if payload.len() != opcode.payload_len() {
            return Err(GfxError::UniformSizeMismatch {
                handle: uniform,
                expected: opcode.payload_len(),
                actual: payload.len(),
            });
        }
        self.frame.uniforms_mut().write(opcode, payload)
    }

    /// Registers `rect` in the frame's scissor table and selects it.
    ///
    /// Returns the index for [`set_scissor_cached`](Self::set_scissor_cached).
    /// A zero-area rect or a full table disables the scissor and returns 0.
    pub fn set_scissor(&mut self, rect: ScissorRect) -> u16 {
        let index = if rect.is_empty() {
            0
        } else {
            match self.frame.push_scissor(rect) {
                Some(index) => index,
                None => {
                    log::warn!("scissor table full; drawing {rect:?} unclipped");
                    0
                }
            }
        };
        self.pending.scissor = index;
        index
    }

    /// Selects a rect previously returned by [`set_scissor`](Self::set_scissor). `0` disables.
    pub fn set_scissor_cached(&mut self, index: u16) {
        self.pending.scissor = if index as usize <= self.frame.scissor_count() {
            index
        } else {
            log::warn!("unknown scissor index {index}; scissor disabled");
            0
        };
    }

    /// Discards the pending draw, including any uniforms written for it.
    pub fn discard(&mut self) {
        self.pending = DrawCall::EMPTY;
        self.uniform_begin = self.frame.uniforms().pos();
    }

    // ── submission ────────────────────────────────────────────────────────

    /// Records the pending draw into `view`.
    ///
    /// Returns the number of draw calls recorded: 1, or 0 when the frame is full.
    /// A draw without index or vertex counts is recorded as a touch.
    pub fn submit(
        &mut self,
        view: u8,
        program: Handle,
        depth: u32,
        preserve_state: bool,
    ) -> GfxResult<u32> {
        self.check_view(view)?;
        expect_kind(program, ResourceKind::Program)?;
        Ok(self.record(view, program, depth, preserve_state))
    }

    /// Submits an empty draw so `view` is processed even with nothing in it.
    ///
    /// Pending state and uniforms are applied at replay; geometry is ignored.
    pub fn touch(&mut self, view: u8) -> GfxResult<u32> {
        self.check_view(view)?;
        self.pending.index = BufferBinding::none(ResourceKind::IndexBuffer);
        self.pending.streams = [BufferBinding::none(ResourceKind::VertexBuffer); MAX_VERTEX_STREAMS];
        Ok(self.record(view, Handle::invalid(ResourceKind::Program), 0, false))
    }

    fn record(&mut self, view: u8, program: Handle, depth: u32, preserve_state: bool) -> u32 {
        let uniform_end = self.frame.uniforms().pos();

        let mut draw = self.pending;
        draw.program = program;
        draw.uniform_begin = self.uniform_begin as u32;
        draw.uniform_end = uniform_end as u32;
        self.uniform_begin = uniform_end;

        let key = self.sort_key(view, &draw, depth);
        let recorded = self.frame.push(key.encode(), draw);

        if !recorded && self.debug.contains(DebugFlags::SUBMIT) {
            log::debug!(
                "frame full ({} draws); dropped draw for view {view}",
                self.frame.max_draw_calls()
            );
        }

        if !preserve_state {
            self.pending = DrawCall::EMPTY;
        }

        recorded as u32
    }

    fn sort_key(&mut self, view: u8, draw: &DrawCall, depth: u32) -> SortKey {
        let depth = depth.min(SortKey::ORDER_MAX as u32) as u16;
        let seq = &mut self.view_seq[view as usize];

        match self.view_modes[view as usize] {
            ViewMode::DepthAscending => pipeline_key(view, depth, draw),
            ViewMode::DepthDescending => {
                pipeline_key(view, SortKey::ORDER_MAX as u16 - depth, draw)
            }
            ViewMode::Sequential => {
                let order = (*seq).min(SortKey::ORDER_MAX as u32) as u16;
                *seq = seq.saturating_add(1);
                SortKey::new(view, order, 0, 0, 0)
            }
        }
    }

    // ── frame boundary ────────────────────────────────────────────────────

    /// Queues `handle` to be freed after the current frame has been replayed.
    pub fn defer_free(&mut self, handle: Handle) {
        self.frame.defer_free(handle);
    }

    /// Sorts the recorded frame and hands it off, continuing with `spare`.
    ///
    /// `spare` is reset before use; pass the frame returned by the previous call
    /// once it has been replayed to avoid reallocating.
    pub fn end_frame(&mut self, mut spare: Frame) -> Frame {
        spare.reset();
        let mut frame = std::mem::replace(&mut self.frame, spare);
        frame.sort();

        if frame.dropped() > 0 {
            log::warn!(
                "{} draw calls dropped this frame (capacity {})",
                frame.dropped(),
                frame.max_draw_calls()
            );
        }

        self.pending = DrawCall::EMPTY;
        self.uniform_begin = 0;
        self.view_seq.fill(0);
        frame
    }
}

fn pipeline_key(view: u8, order: u16, draw: &DrawCall) -> SortKey {
    // Texture field: first bound stage, 0 when the draw is untextured.
    let texture = draw
        .textures
        .iter()
        .find(|binding| binding.is_bound())
        .map_or(0, |binding| binding.texture.slot());

    SortKey::new(
        view,
        order,
        (draw.program.slot() as u64 & SortKey::SHADER_MAX) as u8,
        draw.state.blend() as u8,
        (texture as u64 & SortKey::TEXTURE_MAX) as u16,
    )
}

fn expect_kind(handle: Handle, expected: ResourceKind) -> GfxResult<()> {
    if handle.is(expected) {
        Ok(())
    } else {
        Err(GfxError::WrongKind { handle, expected })
    }
}
