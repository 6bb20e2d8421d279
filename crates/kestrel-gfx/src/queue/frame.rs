use crate::config::GfxConfig;
use crate::handle::Handle;

use super::draw::{DrawCall, ScissorRect};
use super::uniform::UniformBuffer;

/// How a view derives the `order` field of its sort keys.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ViewMode {
    /// Smaller depth draws first.
    #[default]
    DepthAscending,
    /// Larger depth draws first (back-to-front for transparent geometry).
    DepthDescending,
    /// Submission order. Depth is ignored and pipeline grouping is disabled.
    Sequential,
}

/// One frame of recorded work.
///
/// `sort_keys[i]` / `sort_values[i]` pair a packed [`SortKey`](super::SortKey)
/// with an index into `draw_calls`. Before [`sort`](Frame::sort) the pairs are
/// in submission order; after it they are in replay order.
///
/// All arrays are preallocated to the configured capacity and never grow past it.
#[derive(Debug, Clone)]
pub struct Frame {
    sort_keys: Vec<u64>,
    sort_values: Vec<u32>,
    draw_calls: Vec<DrawCall>,
    uniforms: UniformBuffer,
    /// Slot 0 is a placeholder for "scissor disabled".
    scissors: Vec<ScissorRect>,
    deferred_frees: Vec<Handle>,
    dropped: u32,
    sorted: bool,

    max_draw_calls: usize,
    max_scissor_rects: usize,

    // Reused by `sort` so steady-state frames don't allocate.
    scratch: Vec<(u64, u32)>,
}

impl Frame {
    pub fn new(config: &GfxConfig) -> Self {
        let mut scissors = Vec::with_capacity(config.max_scissor_rects);
        scissors.push(ScissorRect::default());

        Self {
            sort_keys: Vec::with_capacity(config.max_draw_calls),
            sort_values: Vec::with_capacity(config.max_draw_calls),
            draw_calls: Vec::with_capacity(config.max_draw_calls),
            uniforms: UniformBuffer::new(config.uniform_buffer_initial, config.uniform_buffer_max),
            scissors,
            deferred_frees: Vec::new(),
            dropped: 0,
            sorted: false,
            max_draw_calls: config.max_draw_calls,
            max_scissor_rects: config.max_scissor_rects,
            scratch: Vec::with_capacity(config.max_draw_calls),
        }
    }

    /// Number of recorded draw calls (touches included).
    #[inline]
    pub fn len(&self) -> usize {
        self.draw_calls.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.draw_calls.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.draw_calls.len() >= self.max_draw_calls
    }

    #[inline]
    pub fn max_draw_calls(&self) -> usize {
        self.max_draw_calls
    }

    /// Submissions rejected because the frame was full.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    #[inline]
    pub fn sort_keys(&self) -> &[u64] {
        &self.sort_keys
    }

    #[inline]
    pub fn sort_values(&self) -> &[u32] {
        &self.sort_values
    }

    /// Draw calls in submission order.
    #[inline]
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    #[inline]
    pub fn uniforms(&self) -> &UniformBuffer {
        &self.uniforms
    }

    #[inline]
    pub fn uniforms_mut(&mut self) -> &mut UniformBuffer {
        &mut self.uniforms
    }

    /// Rect for a scissor index. `None` for index 0 or an unknown index.
    pub fn scissor(&self, index: u16) -> Option<ScissorRect> {
        if index == 0 {
            return None;
        }
        self.scissors.get(index as usize).copied()
    }

    #[inline]
    pub fn scissor_count(&self) -> usize {
        self.scissors.len() - 1
    }

    /// Handles to release once this frame has been replayed.
    #[inline]
    pub fn deferred_frees(&self) -> &[Handle] {
        &self.deferred_frees
    }

    /// Draw calls in replay order, paired with their sort key.
    ///
    /// Yields submission order if the frame hasn't been sorted.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (u64, &DrawCall)> + '_ {
        self.sort_keys
            .iter()
            .zip(&self.sort_values)
            .map(|(&key, &index)| (key, &self.draw_calls[index as usize]))
    }

    /// Appends a draw call. Returns `false` (and counts a drop) when the frame is full.
    pub(crate) fn push(&mut self, key: u64, draw: DrawCall) -> bool {
        if self.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return false;
        }

        self.sort_keys.push(key);
        self.sort_values.push(self.draw_calls.len() as u32);
        self.draw_calls.push(draw);
        self.sorted = false;
        true
    }

    /// Adds a scissor rect and returns its index, or `None` when the table is full.
    pub(crate) fn push_scissor(&mut self, rect: ScissorRect) -> Option<u16> {
        if let Some(existing) = self.scissors[1..].iter().position(|r| *r == rect) {
            return Some(existing as u16 + 1);
        }
        if self.scissors.len() > self.max_scissor_rects {
            return None;
        }
        self.scissors.push(rect);
        Some((self.scissors.len() - 1) as u16)
    }

    pub(crate) fn defer_free(&mut self, handle: Handle) {
        self.deferred_frees.push(handle);
    }

    pub(crate) fn take_deferred_frees(&mut self) -> Vec<Handle> {
        std::mem::take(&mut self.deferred_frees)
    }

    /// Orders the `(key, index)` pairs ascending by key.
    ///
    /// Ties keep submission order: indices are unique, so sorting on the pair
    /// is equivalent to a stable sort on the key alone.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }

        self.scratch.clear();
        self.scratch
            .extend(self.sort_keys.iter().copied().zip(self.sort_values.iter().copied()));
        self.scratch.sort_unstable();

        for (i, &(key, index)) in self.scratch.iter().enumerate() {
            self.sort_keys[i] = key;
            self.sort_values[i] = index;
        }
        self.sorted = true;
    }

    /// Clears recorded work. Keeps every allocation.
    pub fn reset(&mut self) {
        self.sort_keys.clear();
        self.sort_values.clear();
        self.draw_calls.clear();
        self.uniforms.reset();
        self.scissors.truncate(1);
        self.deferred_frees.clear();
        self.dropped = 0;
        self.sorted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(max_draw_calls: usize) -> GfxConfig {
        GfxConfig {
            max_draw_calls,
            max_scissor_rects: 2,
            uniform_buffer_initial: 64,
            uniform_buffer_max: 256,
            ..Default::default()
        }
    }

    #[test]
    fn push_past_capacity_counts_drop() {
        let mut frame = Frame::new(&small_config(2));
        assert!(frame.push(1, DrawCall::EMPTY));
        assert!(frame.push(2, DrawCall::EMPTY));
        assert!(!frame.push(3, DrawCall::EMPTY));
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.dropped(), 1);
        assert_eq!(frame.draw_calls().len(), 2);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut frame = Frame::new(&small_config(8));
        for key in [5, 1, 5, 1, 5] {
            frame.push(key, DrawCall::EMPTY);
        }
        frame.sort();
        assert_eq!(frame.sort_keys(), &[1, 1, 5, 5, 5]);
        assert_eq!(frame.sort_values(), &[1, 3, 0, 2, 4]);
    }

    #[test]
    fn scissor_table_dedups_and_reserves_zero() {
        let mut frame = Frame::new(&small_config(4));
        let a = ScissorRect::new(0, 0, 10, 10);
        let b = ScissorRect::new(5, 5, 10, 10);
        assert_eq!(frame.push_scissor(a), Some(1));
        assert_eq!(frame.push_scissor(a), Some(1));
        assert_eq!(frame.push_scissor(b), Some(2));
        assert_eq!(frame.push_scissor(ScissorRect::new(1, 1, 1, 1)), None);

        assert_eq!(frame.scissor(0), None);
        assert_eq!(frame.scissor(2), Some(b));
        assert_eq!(frame.scissor(9), None);
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut frame = Frame::new(&small_config(4));
        frame.push(1, DrawCall::EMPTY);
        frame.push_scissor(ScissorRect::new(0, 0, 4, 4));
        frame.reset();
        assert!(frame.is_empty());
        assert_eq!(frame.scissor_count(), 0);
        assert!(frame.draw_calls.capacity() >= 4);
    }
}
