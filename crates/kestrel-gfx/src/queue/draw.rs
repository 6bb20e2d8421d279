use crate::config::{MAX_TEXTURE_STAGES, MAX_VERTEX_STREAMS};
use crate::handle::{Handle, ResourceKind};

use super::state::{RenderState, Stencil};

/// Scissor rectangle in framebuffer pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A buffer range: `count` elements starting at `first`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BufferBinding {
    pub handle: Handle,
    pub first: u32,
    pub count: u32,
}

impl BufferBinding {
    pub const fn none(kind: ResourceKind) -> Self {
        Self {
            handle: Handle::invalid(kind),
            first: 0,
            count: 0,
        }
    }

    #[inline]
    pub const fn is_bound(&self) -> bool {
        self.handle.is_valid()
    }
}

/// Texture plus the sampler uniform that selects its stage in the shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureBinding {
    pub sampler: Handle,
    pub texture: Handle,
}

impl TextureBinding {
    pub const NONE: TextureBinding = TextureBinding {
        sampler: Handle::invalid(ResourceKind::Uniform),
        texture: Handle::invalid(ResourceKind::Texture),
    };

    #[inline]
    pub const fn is_bound(&self) -> bool {
        self.texture.is_valid()
    }
}

/// Everything replay needs to issue one draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub program: Handle,
    pub index: BufferBinding,
    pub streams: [BufferBinding; MAX_VERTEX_STREAMS],
    pub textures: [TextureBinding; MAX_TEXTURE_STAGES],
    /// Byte range of this draw's entries in the frame's uniform buffer.
    pub uniform_begin: u32,
    pub uniform_end: u32,
    /// Index into the frame's scissor table; `0` disables the scissor test.
    pub scissor: u16,
    pub stencil: Stencil,
    pub state: RenderState,
}

impl DrawCall {
    pub const EMPTY: DrawCall = DrawCall {
        program: Handle::invalid(ResourceKind::Program),
        index: BufferBinding::none(ResourceKind::IndexBuffer),
        streams: [BufferBinding::none(ResourceKind::VertexBuffer); MAX_VERTEX_STREAMS],
        textures: [TextureBinding::NONE; MAX_TEXTURE_STAGES],
        uniform_begin: 0,
        uniform_end: 0,
        scissor: 0,
        stencil: Stencil::DISABLED,
        state: RenderState::DEFAULT,
    };

    /// Vertex count for a non-indexed draw: the smallest count across bound streams.
    pub fn vertex_count(&self) -> u32 {
        self.streams
            .iter()
            .filter(|s| s.is_bound())
            .map(|s| s.count)
            .min()
            .unwrap_or(0)
    }

    /// No geometry: replay applies state and uniforms but emits no draw.
    #[inline]
    pub fn is_touch(&self) -> bool {
        self.index.count == 0 && self.vertex_count() == 0
    }

    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.index.is_bound() && self.index.count > 0
    }
}

impl Default for DrawCall {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draw_is_a_touch() {
        assert!(DrawCall::EMPTY.is_touch());
        assert!(!DrawCall::EMPTY.is_indexed());
    }

    #[test]
    fn vertex_count_uses_smallest_bound_stream() {
        let mut draw = DrawCall::EMPTY;
        draw.streams[0] = BufferBinding {
            handle: Handle::new(ResourceKind::VertexBuffer, 1),
            first: 0,
            count: 6,
        };
        assert_eq!(draw.vertex_count(), 6);
        draw.streams[1] = BufferBinding {
            handle: Handle::new(ResourceKind::VertexBuffer, 2),
            first: 0,
            count: 4,
        };
        assert_eq!(draw.vertex_count(), 4);
        assert!(!draw.is_touch());
    }

    #[test]
    fn zero_area_scissor_is_empty() {
        assert!(ScissorRect::new(4, 4, 0, 10).is_empty());
        assert!(!ScissorRect::new(0, 0, 1, 1).is_empty());
    }
}
