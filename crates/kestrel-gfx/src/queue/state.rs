//! Packed per-draw pipeline state.
//!
//! [`RenderState`] layout (LSB first):
//!
//! | bits   | field                               |
//! |--------|-------------------------------------|
//! | 0..4   | depth test function (0 = disabled)  |
//! | 4..8   | color write mask R, G, B, A         |
//! | 8      | depth write                         |
//! | 12..15 | blend mode                          |
//! | 16..19 | primitive topology                  |
//!
//! Replay diffs consecutive words group by group; see the `*_MASK` constants.

/// Comparison function shared by depth and stencil tests.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CompareFunc {
    Less = 1,
    LessEqual = 2,
    Equal = 3,
    GreaterEqual = 4,
    Greater = 5,
    NotEqual = 6,
    Never = 7,
    Always = 8,
}

impl CompareFunc {
    #[inline]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(CompareFunc::Less),
            2 => Some(CompareFunc::LessEqual),
            3 => Some(CompareFunc::Equal),
            4 => Some(CompareFunc::GreaterEqual),
            5 => Some(CompareFunc::Greater),
            6 => Some(CompareFunc::NotEqual),
            7 => Some(CompareFunc::Never),
            8 => Some(CompareFunc::Always),
            _ => None,
        }
    }
}

/// Blend equation preset. Fits the sort key's 3-bit blend field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum BlendMode {
    /// No blending; source replaces destination.
    Replace = 0,
    /// Straight alpha: `src * a + dst * (1 - a)`.
    #[default]
    Alpha = 1,
    /// Premultiplied alpha: `src + dst * (1 - a)`.
    Premultiplied = 2,
    Additive = 3,
    Multiply = 4,
    Screen = 5,
}

impl BlendMode {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => BlendMode::Alpha,
            2 => BlendMode::Premultiplied,
            3 => BlendMode::Additive,
            4 => BlendMode::Multiply,
            5 => BlendMode::Screen,
            _ => BlendMode::Replace,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum PrimitiveType {
    #[default]
    Triangles = 0,
    TriangleStrip = 1,
    Lines = 2,
    LineStrip = 3,
    Points = 4,
}

impl PrimitiveType {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => PrimitiveType::TriangleStrip,
            2 => PrimitiveType::Lines,
            3 => PrimitiveType::LineStrip,
            4 => PrimitiveType::Points,
            _ => PrimitiveType::Triangles,
        }
    }
}

/// Per-channel color write mask.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorMask {
    pub const ALL: ColorMask = ColorMask { r: true, g: true, b: true, a: true };
    pub const NONE: ColorMask = ColorMask { r: false, g: false, b: false, a: false };
    pub const RGB: ColorMask = ColorMask { r: true, g: true, b: true, a: false };
}

/// 64-bit render-state word attached to every draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RenderState(pub u64);

impl RenderState {
    pub const DEPTH_TEST_SHIFT: u32 = 0;
    pub const DEPTH_TEST_MASK: u64 = 0xf << Self::DEPTH_TEST_SHIFT;

    pub const WRITE_R: u64 = 1 << 4;
    pub const WRITE_G: u64 = 1 << 5;
    pub const WRITE_B: u64 = 1 << 6;
    pub const WRITE_A: u64 = 1 << 7;
    pub const WRITE_RGB: u64 = Self::WRITE_R | Self::WRITE_G | Self::WRITE_B;
    pub const COLOR_MASK: u64 = Self::WRITE_RGB | Self::WRITE_A;

    pub const DEPTH_WRITE: u64 = 1 << 8;

    pub const BLEND_SHIFT: u32 = 12;
    pub const BLEND_MASK: u64 = 0x7 << Self::BLEND_SHIFT;

    pub const PRIMITIVE_SHIFT: u32 = 16;
    pub const PRIMITIVE_MASK: u64 = 0x7 << Self::PRIMITIVE_SHIFT;

    /// Color writes on, straight alpha blending, triangle lists, no depth.
    pub const DEFAULT: RenderState = RenderState(
        Self::COLOR_MASK
            | ((BlendMode::Alpha as u64) << Self::BLEND_SHIFT)
            | ((PrimitiveType::Triangles as u64) << Self::PRIMITIVE_SHIFT),
    );

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn depth_test(self) -> Option<CompareFunc> {
        CompareFunc::from_bits(((self.0 & Self::DEPTH_TEST_MASK) >> Self::DEPTH_TEST_SHIFT) as u8)
    }

    #[inline]
    pub fn depth_write(self) -> bool {
        self.0 & Self::DEPTH_WRITE != 0
    }

    #[inline]
    pub fn color_mask(self) -> ColorMask {
        ColorMask {
            r: self.0 & Self::WRITE_R != 0,
            g: self.0 & Self::WRITE_G != 0,
            b: self.0 & Self::WRITE_B != 0,
            a: self.0 & Self::WRITE_A != 0,
        }
    }

    #[inline]
    pub fn blend(self) -> BlendMode {
        BlendMode::from_bits(((self.0 & Self::BLEND_MASK) >> Self::BLEND_SHIFT) as u8)
    }

    #[inline]
    pub fn primitive(self) -> PrimitiveType {
        PrimitiveType::from_bits(((self.0 & Self::PRIMITIVE_MASK) >> Self::PRIMITIVE_SHIFT) as u8)
    }

    #[must_use]
    pub fn with_depth_test(self, func: Option<CompareFunc>) -> Self {
        let bits = func.map_or(0, |f| f as u64) << Self::DEPTH_TEST_SHIFT;
        Self((self.0 & !Self::DEPTH_TEST_MASK) | bits)
    }

    #[must_use]
    pub fn with_depth_write(self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | Self::DEPTH_WRITE)
        } else {
            Self(self.0 & !Self::DEPTH_WRITE)
        }
    }

    #[must_use]
    pub fn with_color_mask(self, mask: ColorMask) -> Self {
        let mut bits = self.0 & !Self::COLOR_MASK;
        if mask.r {
            bits |= Self::WRITE_R;
        }
        if mask.g {
            bits |= Self::WRITE_G;
        }
        if mask.b {
            bits |= Self::WRITE_B;
        }
        if mask.a {
            bits |= Self::WRITE_A;
        }
        Self(bits)
    }

    #[must_use]
    pub fn with_blend(self, blend: BlendMode) -> Self {
        Self((self.0 & !Self::BLEND_MASK) | ((blend as u64) << Self::BLEND_SHIFT))
    }

    #[must_use]
    pub fn with_primitive(self, primitive: PrimitiveType) -> Self {
        Self((self.0 & !Self::PRIMITIVE_MASK) | ((primitive as u64) << Self::PRIMITIVE_SHIFT))
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum StencilOp {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    IncrementClamp = 3,
    DecrementClamp = 4,
    Invert = 5,
    IncrementWrap = 6,
    DecrementWrap = 7,
}

impl StencilOp {
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits {
            1 => StencilOp::Zero,
            2 => StencilOp::Replace,
            3 => StencilOp::IncrementClamp,
            4 => StencilOp::DecrementClamp,
            5 => StencilOp::Invert,
            6 => StencilOp::IncrementWrap,
            7 => StencilOp::DecrementWrap,
            _ => StencilOp::Keep,
        }
    }
}

/// Decoded stencil test.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StencilState {
    pub func: CompareFunc,
    pub reference: u8,
    pub read_mask: u8,
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
}

/// Packed stencil word. `Stencil::DISABLED` (all zeros) turns the test off.
///
/// Layout: `ref:8 | read_mask:8 << 8 | func:4 << 16 | fail_op:3 << 20 | pass_op:3 << 24`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Stencil(pub u32);

impl Stencil {
    pub const DISABLED: Stencil = Stencil(0);

    pub const fn new(state: StencilState) -> Self {
        Self(
            state.reference as u32
                | (state.read_mask as u32) << 8
                | (state.func as u32) << 16
                | (state.fail_op as u32) << 20
                | (state.pass_op as u32) << 24,
        )
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// `None` when the stencil test is disabled.
    pub fn decode(self) -> Option<StencilState> {
        let func = CompareFunc::from_bits(((self.0 >> 16) & 0xf) as u8)?;
        Some(StencilState {
            func,
            reference: (self.0 & 0xff) as u8,
            read_mask: ((self.0 >> 8) & 0xff) as u8,
            fail_op: StencilOp::from_bits(((self.0 >> 20) & 0x7) as u8),
            pass_op: StencilOp::from_bits(((self.0 >> 24) & 0x7) as u8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_fields() {
        let s = RenderState::DEFAULT;
        assert_eq!(s.depth_test(), None);
        assert!(!s.depth_write());
        assert_eq!(s.color_mask(), ColorMask::ALL);
        assert_eq!(s.blend(), BlendMode::Alpha);
        assert_eq!(s.primitive(), PrimitiveType::Triangles);
    }

    #[test]
    fn setters_touch_only_their_group() {
        let base = RenderState::DEFAULT;
        let s = base.with_blend(BlendMode::Additive);
        assert_eq!(s.0 ^ base.0, (s.0 ^ base.0) & RenderState::BLEND_MASK);

        let s = base.with_depth_test(Some(CompareFunc::LessEqual)).with_depth_write(true);
        assert_eq!(s.depth_test(), Some(CompareFunc::LessEqual));
        assert!(s.depth_write());
        assert_eq!(s.blend(), BlendMode::Alpha);

        let s = base.with_primitive(PrimitiveType::LineStrip);
        assert_eq!(s.primitive(), PrimitiveType::LineStrip);
        assert_eq!(s.with_primitive(PrimitiveType::Triangles), base);
    }

    #[test]
    fn color_mask_round_trips() {
        let s = RenderState::DEFAULT.with_color_mask(ColorMask::RGB);
        assert_eq!(s.color_mask(), ColorMask::RGB);
        assert_eq!(s.0 & RenderState::WRITE_A, 0);
    }

    #[test]
    fn stencil_disabled_decodes_to_none() {
        assert_eq!(Stencil::DISABLED.decode(), None);
    }

    #[test]
    fn stencil_word_decodes_fields() {
        let state = StencilState {
            func: CompareFunc::Equal,
            reference: 3,
            read_mask: 0xff,
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::IncrementClamp,
        };
        assert_eq!(Stencil::new(state).decode(), Some(state));
    }
}
