//! Creation-time descriptions of GPU resources.

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum IndexFormat {
    #[default]
    U16,
    U32,
}

impl IndexFormat {
    #[inline]
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    /// Four normalized bytes, typically a packed color.
    Unorm8x4,
}

impl VertexFormat {
    #[inline]
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    pub format: VertexFormat,
    /// Byte offset within one vertex.
    pub offset: u32,
}

/// Interleaved vertex layout of one buffer.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Default)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// A layout with no declared attributes; only the stride is known.
    pub fn with_stride(stride: u32) -> Self {
        Self {
            stride,
            attributes: Vec::new(),
        }
    }

    /// Appends an attribute at the current end of the vertex and grows the stride.
    #[must_use]
    pub fn push(mut self, location: u32, format: VertexFormat) -> Self {
        let offset = self
            .attributes
            .last()
            .map_or(0, |a| a.offset + a.format.size());
        self.attributes.push(VertexAttribute {
            location,
            format,
            offset,
        });
        self.stride = self.stride.max(offset + format.size());
        self
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    /// Single channel, used for glyph atlases and masks.
    R8,
}

impl TextureFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::R8 => 1,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

/// Sampling parameters stored with a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

impl SamplerDesc {
    /// Point sampling, clamped. Suited to pixel art.
    pub const PIXEL: SamplerDesc = SamplerDesc {
        filter: FilterMode::Nearest,
        wrap: WrapMode::Clamp,
    };
}

/// Pixel data for a 2D texture.
#[derive(Debug, Copy, Clone)]
pub struct Image<'a> {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Tightly packed rows, top row first.
    pub pixels: &'a [u8],
}

impl<'a> Image<'a> {
    pub fn rgba8(width: u32, height: u32, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            format: TextureFormat::Rgba8,
            pixels,
        }
    }

    /// Byte length implied by the dimensions and format.
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}
