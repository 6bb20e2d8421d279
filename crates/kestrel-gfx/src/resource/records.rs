use crate::backend::NativeId;
use crate::handle::{FreeList, Handle, ResourceKind};
use crate::queue::UniformType;

use super::desc::{IndexFormat, SamplerDesc, TextureFormat, VertexLayout};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBufferRecord {
    pub native: NativeId,
    /// Size in bytes.
    pub size: u32,
    pub format: IndexFormat,
}

impl IndexBufferRecord {
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.size / self.format.size()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferRecord {
    pub native: NativeId,
    pub size: u32,
    pub layout: VertexLayout,
}

impl VertexBufferRecord {
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        if self.layout.stride == 0 {
            0
        } else {
            self.size / self.layout.stride
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureRecord {
    pub native: NativeId,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub sampler: SamplerDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformRecord {
    pub native: NativeId,
    /// Program the uniform was resolved against.
    pub program: Handle,
    pub name: String,
    pub ty: UniformType,
    pub count: u8,
}

impl UniformRecord {
    /// Payload size of one `set_uniform` call.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.ty.size() as usize * self.count as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramRecord {
    pub native: NativeId,
}

/// Records of one kind, addressed by slot.
#[derive(Debug)]
pub(crate) struct Pool<R> {
    kind: ResourceKind,
    slots: FreeList,
    records: Vec<Option<R>>,
}

impl<R> Pool<R> {
    pub fn new(kind: ResourceKind, capacity: u16) -> Self {
        Self {
            kind,
            slots: FreeList::new(capacity),
            records: Vec::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> u16 {
        self.slots.capacity()
    }

    #[inline]
    pub fn live(&self) -> usize {
        self.slots.live()
    }

    /// Reserves a slot. The record must be stored with [`Pool::insert`].
    pub fn reserve(&mut self) -> Option<Handle> {
        self.slots.alloc().map(|slot| Handle::new(self.kind, slot))
    }

    pub fn insert(&mut self, handle: Handle, record: R) {
        let slot = handle.slot() as usize;
        if self.records.len() <= slot {
            self.records.resize_with(slot + 1, || None);
        }
        self.records[slot] = Some(record);
    }

    /// `None` on kind mismatch, slot 0, a slot past the high-water mark or a freed slot.
    pub fn get(&self, handle: Handle) -> Option<&R> {
        if !handle.is(self.kind) || !self.slots.is_issued(handle.slot()) {
            return None;
        }
        self.records.get(handle.slot() as usize)?.as_ref()
    }

    /// Takes the record out. The slot stays reserved until [`Pool::release`].
    pub fn take(&mut self, handle: Handle) -> Option<R> {
        if !handle.is(self.kind) || !self.slots.is_issued(handle.slot()) {
            return None;
        }
        self.records.get_mut(handle.slot() as usize)?.take()
    }

    pub fn release(&mut self, handle: Handle) {
        self.slots.release(handle.slot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Pool<ProgramRecord> {
        Pool::new(ResourceKind::Program, 8)
    }

    #[test]
    fn get_rejects_other_kinds_with_same_slot() {
        let mut p = pool();
        let h = p.reserve().unwrap();
        p.insert(h, ProgramRecord { native: NativeId(1) });

        assert!(p.get(h).is_some());
        assert!(p.get(Handle::new(ResourceKind::Texture, h.slot())).is_none());
    }

    #[test]
    fn get_rejects_slots_never_issued() {
        let mut p = pool();
        let h = p.reserve().unwrap();
        p.insert(h, ProgramRecord { native: NativeId(1) });

        assert!(p.get(Handle::invalid(ResourceKind::Program)).is_none());
        assert!(p.get(Handle::new(ResourceKind::Program, 2)).is_none());
        assert!(p.get(Handle::new(ResourceKind::Program, 4000)).is_none());
    }

    #[test]
    fn taken_record_is_gone_until_reinserted() {
        let mut p = pool();
        let h = p.reserve().unwrap();
        p.insert(h, ProgramRecord { native: NativeId(1) });

        assert!(p.take(h).is_some());
        assert!(p.get(h).is_none());
        assert!(p.take(h).is_none());
        p.release(h);

        assert_eq!(p.reserve(), Some(h));
    }

    #[test]
    fn index_and_vertex_counts() {
        let ib = IndexBufferRecord {
            native: NativeId(1),
            size: 12,
            format: IndexFormat::U16,
        };
        assert_eq!(ib.index_count(), 6);

        let vb = VertexBufferRecord {
            native: NativeId(2),
            size: 60,
            layout: VertexLayout::with_stride(20),
        };
        assert_eq!(vb.vertex_count(), 3);
    }
}
