use core::ops::{BitOr, BitOrAssign};

/// Bitmask gating diagnostic output.
///
/// Errors and warnings that change rendering output are always logged; these
/// flags enable the chatty ones.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct DebugFlags(u32);

impl DebugFlags {
    /// Log every invalid handle met during replay, not only the first per frame.
    pub const HANDLES: DebugFlags = DebugFlags(1 << 0);
    /// Trace one line per replayed draw (decoded sort key and program) at `trace` level.
    pub const REPLAY: DebugFlags = DebugFlags(1 << 1);
    /// Log dropped submissions individually.
    pub const SUBMIT: DebugFlags = DebugFlags(1 << 2);
    /// Log resource creation and destruction.
    pub const RESOURCES: DebugFlags = DebugFlags(1 << 3);

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn all() -> Self {
        Self(Self::HANDLES.0 | Self::REPLAY.0 | Self::SUBMIT.0 | Self::RESOURCES.0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: DebugFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DebugFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DebugFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_checks_every_bit() {
        let flags = DebugFlags::HANDLES | DebugFlags::SUBMIT;
        assert!(flags.contains(DebugFlags::HANDLES));
        assert!(!flags.contains(DebugFlags::REPLAY));
        assert!(!flags.contains(DebugFlags::HANDLES | DebugFlags::REPLAY));
        assert!(DebugFlags::all().contains(flags));
    }

    #[test]
    fn empty_contains_only_empty() {
        assert!(DebugFlags::empty().contains(DebugFlags::empty()));
        assert!(!DebugFlags::empty().contains(DebugFlags::RESOURCES));
    }
}
