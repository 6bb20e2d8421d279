//! Capacities and behaviour switches for a [`RenderDevice`](crate::RenderDevice).

use crate::error::{GfxError, GfxResult};
use crate::handle::{Handle, ResourceKind};
use crate::logging::DebugFlags;
use crate::queue::SortKey;

/// How the public API reacts to recoverable misuse (bad view id, bad stream, stale handle).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Strictness {
    /// Log and continue. The frame degrades instead of failing.
    #[default]
    Lenient,
    /// Return the error to the caller.
    Strict,
}

impl Strictness {
    #[inline]
    pub fn is_strict(self) -> bool {
        self == Strictness::Strict
    }
}

/// Per-kind slot capacities. Each value counts the reserved slot 0.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SlotCapacities {
    pub index_buffers: u16,
    pub vertex_buffers: u16,
    pub textures: u16,
    /// Bounded by 256: uniform slots are stored in one byte of the uniform opcode.
    pub uniforms: u16,
    pub programs: u16,
}

impl SlotCapacities {
    pub fn get(&self, kind: ResourceKind) -> u16 {
        match kind {
            ResourceKind::IndexBuffer => self.index_buffers,
            ResourceKind::VertexBuffer => self.vertex_buffers,
            ResourceKind::Texture => self.textures,
            ResourceKind::Uniform => self.uniforms,
            ResourceKind::Program => self.programs,
        }
    }
}

impl Default for SlotCapacities {
    fn default() -> Self {
        Self {
            index_buffers: 2048,
            vertex_buffers: 2048,
            textures: 1024,
            uniforms: 256,
            programs: 256,
        }
    }
}

/// Device configuration.
///
/// Capacities are fixed for the lifetime of the device; nothing here is resized at runtime
/// except the uniform buffer, which grows up to `uniform_buffer_max`.
#[derive(Debug, Clone)]
pub struct GfxConfig {
    /// Draw calls recorded per frame before further submissions are dropped.
    pub max_draw_calls: usize,

    /// Number of views. Bounded by 16: the view id is the sort key's layer field.
    pub max_views: u8,

    pub slots: SlotCapacities,

    /// Initial uniform buffer size in bytes.
    pub uniform_buffer_initial: usize,

    /// Hard limit for the uniform buffer. Writes beyond it fail with
    /// [`GfxError::UniformOverflow`].
    pub uniform_buffer_max: usize,

    /// Distinct scissor rects per frame (index 0 is "scissor disabled").
    pub max_scissor_rects: usize,

    pub strictness: Strictness,

    /// Gates per-draw diagnostics.
    pub debug: DebugFlags,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            max_draw_calls: 4096,
            max_views: 16,
            slots: SlotCapacities::default(),
            uniform_buffer_initial: 64 * 1024,
            uniform_buffer_max: 4 * 1024 * 1024,
            max_scissor_rects: 1024,
            strictness: Strictness::Lenient,
            debug: DebugFlags::empty(),
        }
    }
}

/// Texture stages per draw call.
pub const MAX_TEXTURE_STAGES: usize = 2;

/// Vertex streams per draw call.
pub const MAX_VERTEX_STREAMS: usize = 2;

impl GfxConfig {
    /// Checks the bit-width bounds imposed by the packed formats.
    pub fn validate(&self) -> GfxResult<()> {
        if self.max_draw_calls == 0 || self.max_draw_calls > u32::MAX as usize {
            return Err(GfxError::InvalidConfig(format!(
                "max_draw_calls must be in 1..={}",
                u32::MAX
            )));
        }
        if self.max_views == 0 || self.max_views as u64 > SortKey::LAYER_MAX + 1 {
            return Err(GfxError::InvalidConfig(format!(
                "max_views must be in 1..={}",
                SortKey::LAYER_MAX + 1
            )));
        }
        for kind in ResourceKind::ALL {
            let cap = self.slots.get(kind) as usize;
            let limit = if kind == ResourceKind::Uniform {
                256
            } else {
                Handle::MAX_SLOTS
            };
            if !(2..=limit).contains(&cap) {
                return Err(GfxError::InvalidConfig(format!(
                    "{kind} capacity {cap} must be in 2..={limit}"
                )));
            }
        }
        if self.uniform_buffer_max > u32::MAX as usize {
            return Err(GfxError::InvalidConfig(format!(
                "uniform_buffer_max must be at most {} bytes",
                u32::MAX
            )));
        }
        if self.uniform_buffer_initial > self.uniform_buffer_max {
            return Err(GfxError::InvalidConfig(
                "uniform_buffer_initial exceeds uniform_buffer_max".to_string(),
            ));
        }
        if self.max_scissor_rects == 0 || self.max_scissor_rects > u16::MAX as usize {
            return Err(GfxError::InvalidConfig(format!(
                "max_scissor_rects must be in 1..={}",
                u16::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        GfxConfig::default().validate().unwrap();
    }

    #[test]
    fn too_many_views_rejected() {
        let config = GfxConfig {
            max_views: 17,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GfxError::InvalidConfig(_))));
    }

    #[test]
    fn uniform_capacity_limited_by_opcode_slot_byte() {
        let mut config = GfxConfig::default();
        config.slots.uniforms = 257;
        assert!(config.validate().is_err());
        config.slots.uniforms = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn uniform_buffer_max_fits_u32_offsets() {
        let mut config = GfxConfig {
            uniform_buffer_max: u32::MAX as usize + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GfxError::InvalidConfig(_))));
        config.uniform_buffer_max = u32::MAX as usize;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn texture_capacity_limited_by_handle_slot_bits() {
        let mut config = GfxConfig::default();
        config.slots.textures = 4096;
        assert!(config.validate().is_ok());
        config.slots.textures = 4097;
        assert!(config.validate().is_err());
    }
}
