/// Slot allocator for one resource kind.
///
/// Released slots are kept on a LIFO stack and reused before the monotonic
/// high-water index grows. Slot `0` is reserved and never handed out.
#[derive(Debug, Clone)]
pub struct FreeList {
    free: Vec<u16>,
    /// Next never-used slot. Every slot in `1..high_water` has been handed out at least once.
    high_water: u16,
    capacity: u16,
}

impl FreeList {
    /// `capacity` counts slot 0, so `capacity - 1` slots are usable.
    pub fn new(capacity: u16) -> Self {
        Self {
            free: Vec::new(),
            high_water: 1,
            capacity,
        }
    }

    /// Returns a slot, or `None` when every usable slot is live.
    pub fn alloc(&mut self) -> Option<u16> {
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }

        if self.high_water < self.capacity {
            let slot = self.high_water;
            self.high_water += 1;
            Some(slot)
        } else {
            None
        }
    }

    /// Returns `slot` to the stack.
    ///
    /// The caller guarantees `slot` is live; double frees are caught in debug builds.
    pub fn release(&mut self, slot: u16) {
        debug_assert!(slot != 0 && slot < self.high_water, "slot {slot} was never allocated");
        debug_assert!(!self.free.contains(&slot), "slot {slot} released twice");
        self.free.push(slot);
    }

    /// Slot `slot` has been handed out at least once (it is below the high-water mark).
    #[inline]
    pub fn is_issued(&self, slot: u16) -> bool {
        slot != 0 && slot < self.high_water
    }

    #[inline]
    pub fn high_water(&self) -> u16 {
        self.high_water
    }

    #[inline]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Number of slots currently live.
    #[inline]
    pub fn live(&self) -> usize {
        (self.high_water as usize - 1) - self.free.len()
    }

    #[inline]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_alloc_skips_slot_zero() {
        let mut list = FreeList::new(8);
        assert_eq!(list.alloc(), Some(1));
        assert_eq!(list.alloc(), Some(2));
    }

    #[test]
    fn released_slots_come_back_lifo() {
        let mut list = FreeList::new(16);
        let slots: Vec<u16> = (0..6).map(|_| list.alloc().unwrap()).collect();
        assert_eq!(slots, vec![1, 2, 3, 4, 5, 6]);

        list.release(4);
        list.release(2);
        list.release(6);

        assert_eq!(list.alloc(), Some(6));
        assert_eq!(list.alloc(), Some(2));
        assert_eq!(list.alloc(), Some(4));
        assert_eq!(list.high_water(), 7);

        // Only now does the high-water index advance.
        assert_eq!(list.alloc(), Some(7));
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut list = FreeList::new(3);
        assert_eq!(list.alloc(), Some(1));
        assert_eq!(list.alloc(), Some(2));
        assert_eq!(list.alloc(), None);

        list.release(1);
        assert_eq!(list.alloc(), Some(1));
        assert_eq!(list.alloc(), None);
    }

    #[test]
    fn live_count_tracks_alloc_and_release() {
        let mut list = FreeList::new(8);
        list.alloc();
        list.alloc();
        list.alloc();
        list.release(2);
        assert_eq!(list.live(), 2);
        assert_eq!(list.free_len(), 1);
        assert!(list.is_issued(3));
        assert!(!list.is_issued(4));
        assert!(!list.is_issued(0));
    }
}
