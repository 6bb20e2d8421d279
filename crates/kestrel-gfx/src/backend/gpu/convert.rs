//! Mappings from the command layer's enums to wgpu's.

use crate::queue::{
    BlendMode, ColorMask, CompareFunc, PrimitiveType, StencilOp, StencilState, UniformType,
};
use crate::resource::{FilterMode, IndexFormat, SamplerDesc, TextureFormat, VertexFormat, WrapMode};

// ── blend ─────────────────────────────────────────────────────────────────

pub(super) fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    let over = wgpu::BlendComponent::OVER;
    match mode {
        BlendMode::Replace => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
        BlendMode::Premultiplied => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        BlendMode::Additive => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        BlendMode::Multiply => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: over,
        }),
        BlendMode::Screen => Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrc,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: over,
        }),
    }
}

pub(super) fn color_writes(mask: ColorMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    if mask.r {
        writes |= wgpu::ColorWrites::RED;
    }
    if mask.g {
        writes |= wgpu::ColorWrites::GREEN;
    }
    if mask.b {
        writes |= wgpu::ColorWrites::BLUE;
    }
    if mask.a {
        writes |= wgpu::ColorWrites::ALPHA;
    }
    writes
}

// ── depth / stencil ───────────────────────────────────────────────────────

pub(super) fn compare(func: CompareFunc) -> wgpu::CompareFunction {
    match func {
        CompareFunc::Less => wgpu::CompareFunction::Less,
        CompareFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunc::Equal => wgpu::CompareFunction::Equal,
        CompareFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunc::Greater => wgpu::CompareFunction::Greater,
        CompareFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunc::Never => wgpu::CompareFunction::Never,
        CompareFunc::Always => wgpu::CompareFunction::Always,
    }
}

fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
        StencilOp::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOp::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

/// Same test on both faces; 2D geometry has no meaningful winding.
pub(super) fn stencil_state(stencil: Option<StencilState>) -> wgpu::StencilState {
    let Some(s) = stencil else {
        return wgpu::StencilState::default();
    };

    let face = wgpu::StencilFaceState {
        compare: compare(s.func),
        fail_op: stencil_op(s.fail_op),
        depth_fail_op: stencil_op(s.fail_op),
        pass_op: stencil_op(s.pass_op),
    };
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: s.read_mask as u32,
        write_mask: 0xff,
    }
}

// ── geometry ──────────────────────────────────────────────────────────────

pub(super) fn topology(primitive: PrimitiveType) -> wgpu::PrimitiveTopology {
    match primitive {
        PrimitiveType::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveType::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        PrimitiveType::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveType::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveType::Points => wgpu::PrimitiveTopology::PointList,
    }
}

pub(super) fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

pub(super) fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

// ── textures ──────────────────────────────────────────────────────────────

pub(super) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
    }
}

pub(super) fn sampler_descriptor(desc: SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let address = match desc.wrap {
        WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::Mirror => wgpu::AddressMode::MirrorRepeat,
    };
    let filter = match desc.filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };

    wgpu::SamplerDescriptor {
        label: Some("kestrel sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    }
}

// ── uniforms ──────────────────────────────────────────────────────────────

/// Size of one element inside a WGSL uniform block.
///
/// `mat3x3<f32>` columns are padded to 16 bytes.
pub(super) fn uniform_gpu_size(ty: UniformType) -> u32 {
    match ty {
        UniformType::Mat3 => 48,
        other => other.size() as u32,
    }
}

/// Array stride inside a uniform block: elements start on 16-byte boundaries.
pub(super) fn uniform_stride(ty: UniformType) -> u32 {
    uniform_gpu_size(ty).next_multiple_of(16)
}

/// WGSL alignment of a uniform member; arrays align to 16.
pub(super) fn uniform_align(ty: UniformType, count: u8) -> u32 {
    if count > 1 {
        return 16;
    }
    match ty {
        UniformType::Sampler | UniformType::Int | UniformType::Float => 4,
        UniformType::Vec2 => 8,
        _ => 16,
    }
}

/// Bytes a uniform member occupies inside the block.
pub(super) fn uniform_block_len(ty: UniformType, count: u8) -> u32 {
    if count > 1 {
        uniform_stride(ty) * count as u32
    } else {
        uniform_gpu_size(ty)
    }
}

/// Copies tightly packed CPU values into uniform-block layout.
pub(super) fn write_uniform_block(dst: &mut [u8], ty: UniformType, count: u8, src: &[u8]) {
    let cpu_size = ty.size() as usize;
    let stride = if count > 1 {
        uniform_stride(ty) as usize
    } else {
        uniform_gpu_size(ty) as usize
    };

    for (i, element) in src.chunks_exact(cpu_size).take(count as usize).enumerate() {
        let base = i * stride;
        if ty == UniformType::Mat3 {
            for (column, bytes) in element.chunks_exact(12).enumerate() {
                let at = base + column * 16;
                if let Some(out) = dst.get_mut(at..at + 12) {
                    out.copy_from_slice(bytes);
                }
            }
        } else if let Some(out) = dst.get_mut(base..base + cpu_size) {
            out.copy_from_slice(element);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn replace_disables_blending() {
        assert!(blend_state(BlendMode::Replace).is_none());
        assert_eq!(
            blend_state(BlendMode::Premultiplied),
            Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING)
        );
    }

    #[test]
    fn color_mask_maps_per_channel() {
        assert_eq!(color_writes(ColorMask::ALL), wgpu::ColorWrites::ALL);
        assert_eq!(color_writes(ColorMask::RGB), wgpu::ColorWrites::COLOR);
        assert_eq!(color_writes(ColorMask::NONE), wgpu::ColorWrites::empty());
    }

    #[test]
    fn mat3_columns_are_padded() {
        let m: [f32; 9] = core::array::from_fn(|i| i as f32 + 1.0);
        let mut block = [0u8; 48];
        write_uniform_block(&mut block, UniformType::Mat3, 1, bytemuck::cast_slice(&m));

        let floats = floats(&block);
        assert_eq!(&floats[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(floats[3], 0.0);
        assert_eq!(&floats[4..7], &[4.0, 5.0, 6.0]);
        assert_eq!(&floats[8..11], &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn float_arrays_use_sixteen_byte_stride() {
        let values: [f32; 2] = [1.5, 2.5];
        let mut block = [0u8; 32];
        write_uniform_block(&mut block, UniformType::Float, 2, bytemuck::cast_slice(&values));

        let floats = floats(&block);
        assert_eq!(floats[0], 1.5);
        assert_eq!(floats[4], 2.5);
    }

    #[test]
    fn member_alignment_follows_wgsl() {
        assert_eq!(uniform_align(UniformType::Float, 1), 4);
        assert_eq!(uniform_align(UniformType::Vec2, 1), 8);
        assert_eq!(uniform_align(UniformType::Vec3, 1), 16);
        assert_eq!(uniform_align(UniformType::Float, 4), 16);
        assert_eq!(uniform_block_len(UniformType::Mat3, 1), 48);
        assert_eq!(uniform_block_len(UniformType::Vec2, 3), 48);
    }
}
