//! Per-frame uniform command stream.
//!
//! Each entry is a 4-byte little-endian [`UniformOpcode`] followed by
//! `size * count` payload bytes. Replay walks a `[begin, end)` slice of the
//! stream and dispatches each entry to the backend.

use crate::error::{GfxError, GfxResult};

/// Uniform value type. The discriminant is the opcode's type byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum UniformType {
    /// Texture unit index for a sampler (`i32`).
    Sampler = 0,
    Int = 1,
    Float = 2,
    Vec2 = 3,
    Vec3 = 4,
    Vec4 = 5,
    Mat3 = 6,
    Mat4 = 7,
}

impl UniformType {
    #[inline]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(UniformType::Sampler),
            1 => Some(UniformType::Int),
            2 => Some(UniformType::Float),
            3 => Some(UniformType::Vec2),
            4 => Some(UniformType::Vec3),
            5 => Some(UniformType::Vec4),
            6 => Some(UniformType::Mat3),
            7 => Some(UniformType::Mat4),
            _ => None,
        }
    }

    /// Size in bytes of one element.
    #[inline]
    pub const fn size(self) -> u8 {
        match self {
            UniformType::Sampler | UniformType::Int | UniformType::Float => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat3 => 36,
            UniformType::Mat4 => 64,
        }
    }
}

/// Header preceding each uniform payload.
///
/// Packed as `type << 24 | slot << 16 | size << 8 | count`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct UniformOpcode {
    pub ty: u8,
    /// Slot of the uniform handle.
    pub slot: u8,
    /// Bytes per element.
    pub size: u8,
    pub count: u8,
}

impl UniformOpcode {
    pub const BYTES: usize = 4;

    #[inline]
    pub const fn new(ty: UniformType, slot: u8, count: u8) -> Self {
        Self {
            ty: ty as u8,
            slot,
            size: ty.size(),
            count,
        }
    }

    #[inline]
    pub const fn encode(self) -> u32 {
        (self.ty as u32) << 24 | (self.slot as u32) << 16 | (self.size as u32) << 8 | self.count as u32
    }

    #[inline]
    pub const fn decode(bits: u32) -> Self {
        Self {
            ty: (bits >> 24) as u8,
            slot: (bits >> 16) as u8,
            size: (bits >> 8) as u8,
            count: bits as u8,
        }
    }

    #[inline]
    pub fn uniform_type(self) -> Option<UniformType> {
        UniformType::from_bits(self.ty)
    }

    /// Payload length following this header.
    #[inline]
    pub const fn payload_len(self) -> usize {
        self.size as usize * self.count as usize
    }
}

/// Append-only byte stream with an independent read cursor.
///
/// Grows by doubling up to `max_capacity`; a write that would cross it fails
/// and leaves the buffer untouched.
#[derive(Debug, Clone)]
pub struct UniformBuffer {
    data: Vec<u8>,
    read_pos: usize,
    max_capacity: usize,
}

impl UniformBuffer {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(initial_capacity.min(max_capacity)),
            read_pos: 0,
            max_capacity,
        }
    }

    /// Write cursor.
    #[inline]
    pub fn pos(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[inline]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Rewinds both cursors. Keeps the allocation.
    pub fn reset(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Appends `opcode` and `payload`.
    ///
    /// `payload` must be exactly `opcode.payload_len()` bytes.
    pub fn write(&mut self, opcode: UniformOpcode, payload: &[u8]) -> GfxResult<()> {
        debug_assert_eq!(payload.len(), opcode.payload_len());

        let required = self.data.len() + UniformOpcode::BYTES + payload.len();
        if required > self.max_capacity {
            return Err(GfxError::UniformOverflow {
                requested: required,
                capacity: self.max_capacity,
            });
        }

        if required > self.data.capacity() {
            let grown = (self.data.capacity() * 2).max(required).min(self.max_capacity);
            self.data.reserve_exact(grown - self.data.len());
        }

        self.data.extend_from_slice(&opcode.encode().to_le_bytes());
        self.data.extend_from_slice(payload);
        Ok(())
    }

    /// Moves the read cursor. Positions past the write cursor are clamped.
    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.read_pos = pos.min(self.data.len());
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Reads the next opcode, or `None` at the end of the stream.
    pub fn read_opcode(&mut self) -> Option<UniformOpcode> {
        let (opcode, next) = read_opcode_at(&self.data, self.read_pos)?;
        self.read_pos = next;
        Some(opcode)
    }

    /// Reads `len` payload bytes, or `None` if the stream is truncated.
    pub fn read_payload(&mut self, len: usize) -> Option<&[u8]> {
        let end = self.read_pos.checked_add(len)?;
        let bytes = self.data.get(self.read_pos..end)?;
        self.read_pos = end;
        Some(bytes)
    }

    /// Iterates `(opcode, payload)` entries in `[begin, end)` without moving the read cursor.
    pub fn entries(&self, begin: usize, end: usize) -> UniformEntries<'_> {
        let end = end.min(self.data.len());
        UniformEntries {
            data: &self.data[..end],
            pos: begin.min(end),
        }
    }
}

fn read_opcode_at(data: &[u8], pos: usize) -> Option<(UniformOpcode, usize)> {
    let end = pos.checked_add(UniformOpcode::BYTES)?;
    let bytes: [u8; 4] = data.get(pos..end)?.try_into().ok()?;
    Some((UniformOpcode::decode(u32::from_le_bytes(bytes)), end))
}

/// Iterator over a range of the uniform stream. Stops at the first truncated entry.
pub struct UniformEntries<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for UniformEntries<'a> {
    type Item = (UniformOpcode, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (opcode, payload_start) = read_opcode_at(self.data, self.pos)?;
        let payload_end = payload_start + opcode.payload_len();
        let payload = self.data.get(payload_start..payload_end)?;
        self.pos = payload_end;
        Some((opcode, payload))
    }
}
