use core::cmp::Ordering;

/// Packed draw ordering key.
///
/// Bit layout, most significant first:
///
/// | field   | bits | shift |
/// |---------|------|-------|
/// | layer   | 4    | 28    |
/// | order   | 10   | 18    |
/// | shader  | 5    | 13    |
/// | blend   | 3    | 10    |
/// | texture | 10   | 0     |
///
/// Coarse fields sit above fine ones so a plain integer sort groups draws by
/// view first, then explicit depth, then pipeline, then texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SortKey {
    pub layer: u8,
    pub order: u16,
    pub shader: u8,
    pub blend: u8,
    pub texture: u16,
}

impl SortKey {
    pub const TEXTURE_SHIFT: u32 = 0;
    pub const BLEND_SHIFT: u32 = 10;
    pub const SHADER_SHIFT: u32 = 13;
    pub const ORDER_SHIFT: u32 = 18;
    pub const LAYER_SHIFT: u32 = 28;

    pub const TEXTURE_MAX: u64 = (1 << 10) - 1;
    pub const BLEND_MAX: u64 = (1 << 3) - 1;
    pub const SHADER_MAX: u64 = (1 << 5) - 1;
    pub const ORDER_MAX: u64 = (1 << 10) - 1;
    pub const LAYER_MAX: u64 = (1 << 4) - 1;

    #[inline]
    pub const fn new(layer: u8, order: u16, shader: u8, blend: u8, texture: u16) -> Self {
        Self {
            layer,
            order,
            shader,
            blend,
            texture,
        }
    }

    /// Packs the fields. Values wider than their field are truncated.
    #[inline]
    pub const fn encode(&self) -> u64 {
        ((self.layer as u64 & Self::LAYER_MAX) << Self::LAYER_SHIFT)
            | ((self.order as u64 & Self::ORDER_MAX) << Self::ORDER_SHIFT)
            | ((self.shader as u64 & Self::SHADER_MAX) << Self::SHADER_SHIFT)
            | ((self.blend as u64 & Self::BLEND_MAX) << Self::BLEND_SHIFT)
            | ((self.texture as u64 & Self::TEXTURE_MAX) << Self::TEXTURE_SHIFT)
    }

    #[inline]
    pub const fn decode(key: u64) -> Self {
        Self {
            layer: ((key >> Self::LAYER_SHIFT) & Self::LAYER_MAX) as u8,
            order: ((key >> Self::ORDER_SHIFT) & Self::ORDER_MAX) as u16,
            shader: ((key >> Self::SHADER_SHIFT) & Self::SHADER_MAX) as u8,
            blend: ((key >> Self::BLEND_SHIFT) & Self::BLEND_MAX) as u8,
            texture: ((key >> Self::TEXTURE_SHIFT) & Self::TEXTURE_MAX) as u16,
        }
    }
}

impl Ord for SortKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode().cmp(&other.encode())
    }
}

impl PartialOrd for SortKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let key = SortKey::new(1, 2, 3, 4, 5);
        assert_eq!(key.encode(), 0x1008_7005);
        assert_eq!(SortKey::decode(0x1008_7005), key);
    }

    #[test]
    fn round_trip_field_extremes() {
        let maxed = SortKey::new(
            SortKey::LAYER_MAX as u8,
            SortKey::ORDER_MAX as u16,
            SortKey::SHADER_MAX as u8,
            SortKey::BLEND_MAX as u8,
            SortKey::TEXTURE_MAX as u16,
        );
        assert_eq!(SortKey::decode(maxed.encode()), maxed);
        assert_eq!(maxed.encode(), 0xffff_ffff);
        assert_eq!(SortKey::decode(0), SortKey::default());
    }

    #[test]
    fn round_trip_each_bit_of_each_field() {
        for bit in 0..4 {
            let k = SortKey::new(1 << bit, 0, 0, 0, 0);
            assert_eq!(SortKey::decode(k.encode()), k);
        }
        for bit in 0..10 {
            let k = SortKey::new(0, 1 << bit, 0, 0, 1 << bit);
            assert_eq!(SortKey::decode(k.encode()), k);
        }
        for bit in 0..5 {
            let k = SortKey::new(0, 0, 1 << bit, 0, 0);
            assert_eq!(SortKey::decode(k.encode()), k);
        }
        for bit in 0..3 {
            let k = SortKey::new(0, 0, 0, 1 << bit, 0);
            assert_eq!(SortKey::decode(k.encode()), k);
        }
    }

    #[test]
    fn fields_do_not_overlap() {
        let layer = SortKey::new(SortKey::LAYER_MAX as u8, 0, 0, 0, 0).encode();
        let order = SortKey::new(0, SortKey::ORDER_MAX as u16, 0, 0, 0).encode();
        let shader = SortKey::new(0, 0, SortKey::SHADER_MAX as u8, 0, 0).encode();
        let blend = SortKey::new(0, 0, 0, SortKey::BLEND_MAX as u8, 0).encode();
        let texture = SortKey::new(0, 0, 0, 0, SortKey::TEXTURE_MAX as u16).encode();

        let all = [layer, order, shader, blend, texture];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }

    #[test]
    fn layer_dominates_everything_below() {
        let low_layer = SortKey::new(0, 1023, 31, 7, 1023);
        let high_layer = SortKey::new(1, 0, 0, 0, 0);
        assert!(low_layer < high_layer);

        let low_order = SortKey::new(2, 5, 31, 7, 1023);
        let high_order = SortKey::new(2, 6, 0, 0, 0);
        assert!(low_order < high_order);
    }

    #[test]
    fn oversized_values_are_truncated() {
        let k = SortKey::new(0x1f, 0x7ff, 0x3f, 0xf, 0x7ff);
        assert_eq!(SortKey::decode(k.encode()), SortKey::new(0xf, 0x3ff, 0x1f, 0x7, 0x3ff));
    }
}
