use core::fmt;

/// Resource type tag carried in the top 4 bits of a packed handle.
///
/// Discriminant `0` is never used so that an all-zero packed value is not a
/// valid handle of any kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ResourceKind {
    IndexBuffer = 1,
    VertexBuffer = 2,
    Texture = 3,
    Uniform = 4,
    Program = 5,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::IndexBuffer,
        ResourceKind::VertexBuffer,
        ResourceKind::Texture,
        ResourceKind::Uniform,
        ResourceKind::Program,
    ];

    #[inline]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(ResourceKind::IndexBuffer),
            2 => Some(ResourceKind::VertexBuffer),
            3 => Some(ResourceKind::Texture),
            4 => Some(ResourceKind::Uniform),
            5 => Some(ResourceKind::Program),
            _ => None,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            ResourceKind::IndexBuffer => "index buffer",
            ResourceKind::VertexBuffer => "vertex buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Uniform => "uniform",
            ResourceKind::Program => "program",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed reference to a GPU resource slot.
///
/// Packed form (see [`Handle::to_bits`]): `(kind:4) << 12 | (slot:12)`.
/// Slot `0` is the invalid handle for every kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Handle {
    kind: ResourceKind,
    slot: u16,
}

impl Handle {
    pub const SLOT_BITS: u32 = 12;
    pub const SLOT_MASK: u16 = (1 << Self::SLOT_BITS) - 1;
    /// Number of addressable slots per kind, including the reserved slot 0.
    pub const MAX_SLOTS: usize = 1 << Self::SLOT_BITS;

    /// Builds a handle; `slot` is truncated to 12 bits.
    #[inline]
    pub const fn new(kind: ResourceKind, slot: u16) -> Self {
        Self {
            kind,
            slot: slot & Self::SLOT_MASK,
        }
    }

    #[inline]
    pub const fn invalid(kind: ResourceKind) -> Self {
        Self { kind, slot: 0 }
    }

    #[inline]
    pub const fn kind(self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub const fn slot(self) -> u16 {
        self.slot
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.slot != 0
    }

    #[inline]
    pub const fn is(self, kind: ResourceKind) -> bool {
        self.kind as u8 == kind as u8
    }

    #[inline]
    pub const fn to_bits(self) -> u16 {
        ((self.kind as u16) << Self::SLOT_BITS) | self.slot
    }

    /// Unpacks a 16-bit handle. Returns `None` for an unknown kind tag.
    #[inline]
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match ResourceKind::from_bits((bits >> Self::SLOT_BITS) as u8) {
            Some(kind) => Some(Self::new(kind, bits & Self::SLOT_MASK)),
            None => None,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} ({:#06x})", self.kind, self.slot, self.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_kind_into_top_nibble() {
        let h = Handle::new(ResourceKind::Texture, 7);
        assert_eq!(h.to_bits(), 0x3007);
    }

    #[test]
    fn unpack_restores_kind_and_slot() {
        let h = Handle::from_bits(0x5abc).unwrap();
        assert_eq!(h.kind(), ResourceKind::Program);
        assert_eq!(h.slot(), 0xabc);
    }

    #[test]
    fn unknown_kind_tag_is_rejected() {
        assert!(Handle::from_bits(0x0001).is_none());
        assert!(Handle::from_bits(0xf001).is_none());
    }

    #[test]
    fn slot_zero_is_invalid_for_every_kind() {
        for kind in ResourceKind::ALL {
            assert!(!Handle::invalid(kind).is_valid());
            assert!(Handle::new(kind, 1).is_valid());
        }
    }

    #[test]
    fn slot_is_truncated_to_twelve_bits() {
        assert_eq!(Handle::new(ResourceKind::Uniform, 0x1001).slot(), 1);
    }
}
