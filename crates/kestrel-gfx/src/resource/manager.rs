use crate::backend::{GraphicsBackend, NativeId};
use crate::config::{SlotCapacities, Strictness};
use crate::error::{BackendError, GfxError, GfxResult};
use crate::handle::{Handle, ResourceKind};
use crate::logging::DebugFlags;
use crate::queue::UniformType;

use super::desc::{Image, IndexFormat, SamplerDesc, VertexLayout};
use super::records::{
    IndexBufferRecord, Pool, ProgramRecord, TextureRecord, UniformRecord, VertexBufferRecord,
};

/// Fixed-capacity tables of GPU resource records, one per [`ResourceKind`].
///
/// Allocation never fails because the native API does: a backend error is
/// logged and the handle is still issued, backed by [`NativeId::NONE`]. Replay
/// treats such a record as an inert draw target.
///
/// Only slot exhaustion yields [`Handle::invalid`] (or
/// [`GfxError::SlotsExhausted`] in strict mode).
#[derive(Debug)]
pub struct ResourceManager {
    index_buffers: Pool<IndexBufferRecord>,
    vertex_buffers: Pool<VertexBufferRecord>,
    textures: Pool<TextureRecord>,
    uniforms: Pool<UniformRecord>,
    programs: Pool<ProgramRecord>,

    strictness: Strictness,
    debug: DebugFlags,
}

impl ResourceManager {
    pub fn new(capacities: &SlotCapacities, strictness: Strictness, debug: DebugFlags) -> Self {
        Self {
            index_buffers: Pool::new(ResourceKind::IndexBuffer, capacities.index_buffers),
            vertex_buffers: Pool::new(ResourceKind::VertexBuffer, capacities.vertex_buffers),
            textures: Pool::new(ResourceKind::Texture, capacities.textures),
            uniforms: Pool::new(ResourceKind::Uniform, capacities.uniforms),
            programs: Pool::new(ResourceKind::Program, capacities.programs),
            strictness,
            debug,
        }
    }

    // ── allocation ────────────────────────────────────────────────────────

    pub fn alloc_index_buffer<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        data: &[u8],
        format: IndexFormat,
    ) -> GfxResult<Handle> {
        let Some(handle) = self.index_buffers.reserve() else {
            return self.exhausted(ResourceKind::IndexBuffer, self.index_buffers.capacity());
        };

        let size = buffer_size(data.len());
        let created = size.clone().and_then(|_| backend.create_index_buffer(data, format));
        let native = self.native_or_inert(handle, created);
        self.index_buffers.insert(
            handle,
            IndexBufferRecord {
                native,
                size: size.unwrap_or(0),
                format,
            },
        );
        Ok(handle)
    }

    pub fn alloc_vertex_buffer<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        data: &[u8],
        layout: VertexLayout,
    ) -> GfxResult<Handle> {
        let Some(handle) = self.vertex_buffers.reserve() else {
            return self.exhausted(ResourceKind::VertexBuffer, self.vertex_buffers.capacity());
        };

        let size = buffer_size(data.len());
        let created = size.clone().and_then(|_| backend.create_vertex_buffer(data, &layout));
        let native = self.native_or_inert(handle, created);
        self.vertex_buffers.insert(
            handle,
            VertexBufferRecord {
                native,
                size: size.unwrap_or(0),
                layout,
            },
        );
        Ok(handle)
    }

    pub fn alloc_texture<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        image: &Image<'_>,
        sampler: SamplerDesc,
    ) -> GfxResult<Handle> {
        let Some(handle) = self.textures.reserve() else {
            return self.exhausted(ResourceKind::Texture, self.textures.capacity());
        };

        let created = if image.pixels.len() < image.expected_len() {
            Err(BackendError::Creation(format!(
                "{}x{} image needs {} bytes, got {}",
                image.width,
                image.height,
                image.expected_len(),
                image.pixels.len()
            )))
        } else {
            backend.create_texture(image, sampler)
        };

        let native = self.native_or_inert(handle, created);
        self.textures.insert(
            handle,
            TextureRecord {
                native,
                width: image.width,
                height: image.height,
                format: image.format,
                sampler,
            },
        );
        Ok(handle)
    }

    pub fn alloc_program<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        vertex_src: &str,
        fragment_src: &str,
    ) -> GfxResult<Handle> {
        let Some(handle) = self.programs.reserve() else {
            return self.exhausted(ResourceKind::Program, self.programs.capacity());
        };

        let native = self.native_or_inert(handle, backend.create_program(vertex_src, fragment_src));
        self.programs.insert(handle, ProgramRecord { native });
        Ok(handle)
    }

    /// Resolves uniform `name` of `program`.
    ///
    /// An unknown or inert program yields an inert uniform; in strict mode an
    /// unknown program is an error instead.
    pub fn alloc_uniform<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        program: Handle,
        name: &str,
        ty: UniformType,
        count: u8,
    ) -> GfxResult<Handle> {
        let program_native = match self.lookup_program(program) {
            Some(record) => record.native,
            None => {
                let err = self.describe_invalid(program, ResourceKind::Program);
                if self.strictness.is_strict() {
                    return Err(err);
                }
                log::warn!("uniform `{name}`: {err}");
                NativeId::NONE
            }
        };

        let Some(handle) = self.uniforms.reserve() else {
            return self.exhausted(ResourceKind::Uniform, self.uniforms.capacity());
        };

        let count = count.max(1);
        let created = if program_native.is_none() {
            Err(BackendError::Creation(format!("program {program} has no native object")))
        } else {
            backend.create_uniform(program_native, name, ty, count)
        };

        let native = self.native_or_inert(handle, created);
        self.uniforms.insert(
            handle,
            UniformRecord {
                native,
                program,
                name: name.to_string(),
                ty,
                count,
            },
        );
        Ok(handle)
    }

    // ── release ───────────────────────────────────────────────────────────

    /// Destroys the native object, then returns the slot to its free list.
    ///
    /// Callers must not free a handle that a pending frame still references;
    /// [`RenderDevice::free`](crate::RenderDevice::free) defers for that reason.
    pub fn free<B: GraphicsBackend>(&mut self, backend: &mut B, handle: Handle) -> GfxResult<()> {
        let native = match handle.kind() {
            ResourceKind::IndexBuffer => self.index_buffers.take(handle).map(|r| r.native),
            ResourceKind::VertexBuffer => self.vertex_buffers.take(handle).map(|r| r.native),
            ResourceKind::Texture => self.textures.take(handle).map(|r| r.native),
            ResourceKind::Uniform => self.uniforms.take(handle).map(|r| r.native),
            ResourceKind::Program => self.programs.take(handle).map(|r| r.native),
        };

        let Some(native) = native else {
            return Err(GfxError::InvalidHandle(handle));
        };

        if !native.is_none() {
            backend.destroy(handle.kind(), native);
        }

        match handle.kind() {
            ResourceKind::IndexBuffer => self.index_buffers.release(handle),
            ResourceKind::VertexBuffer => self.vertex_buffers.release(handle),
            ResourceKind::Texture => self.textures.release(handle),
            ResourceKind::Uniform => self.uniforms.release(handle),
            ResourceKind::Program => self.programs.release(handle),
        }

        if self.debug.contains(DebugFlags::RESOURCES) {
            log::debug!("freed {handle}");
        }
        Ok(())
    }

    // ── lookup ────────────────────────────────────────────────────────────

    #[inline]
    pub fn lookup_index_buffer(&self, handle: Handle) -> Option<&IndexBufferRecord> {
        self.index_buffers.get(handle)
    }

    #[inline]
    pub fn lookup_vertex_buffer(&self, handle: Handle) -> Option<&VertexBufferRecord> {
        self.vertex_buffers.get(handle)
    }

    #[inline]
    pub fn lookup_texture(&self, handle: Handle) -> Option<&TextureRecord> {
        self.textures.get(handle)
    }

    #[inline]
    pub fn lookup_uniform(&self, handle: Handle) -> Option<&UniformRecord> {
        self.uniforms.get(handle)
    }

    #[inline]
    pub fn lookup_program(&self, handle: Handle) -> Option<&ProgramRecord> {
        self.programs.get(handle)
    }

    /// Native id of any live handle.
    pub fn native(&self, handle: Handle) -> Option<NativeId> {
        match handle.kind() {
            ResourceKind::IndexBuffer => self.lookup_index_buffer(handle).map(|r| r.native),
            ResourceKind::VertexBuffer => self.lookup_vertex_buffer(handle).map(|r| r.native),
            ResourceKind::Texture => self.lookup_texture(handle).map(|r| r.native),
            ResourceKind::Uniform => self.lookup_uniform(handle).map(|r| r.native),
            ResourceKind::Program => self.lookup_program(handle).map(|r| r.native),
        }
    }

    #[inline]
    pub fn is_live(&self, handle: Handle) -> bool {
        self.native(handle).is_some()
    }

    /// Live handles of `kind`.
    pub fn live(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::IndexBuffer => self.index_buffers.live(),
            ResourceKind::VertexBuffer => self.vertex_buffers.live(),
            ResourceKind::Texture => self.textures.live(),
            ResourceKind::Uniform => self.uniforms.live(),
            ResourceKind::Program => self.programs.live(),
        }
    }

    /// Checks that `handle` is a live handle of `expected` kind.
    pub fn validate(&self, handle: Handle, expected: ResourceKind) -> GfxResult<()> {
        if handle.is(expected) && self.is_live(handle) {
            Ok(())
        } else {
            Err(self.describe_invalid(handle, expected))
        }
    }

    // ── helpers ───────────────────────────────────────────────────────────

    fn describe_invalid(&self, handle: Handle, expected: ResourceKind) -> GfxError {
        if handle.is(expected) {
            GfxError::InvalidHandle(handle)
        } else {
            GfxError::WrongKind { handle, expected }
        }
    }

    fn exhausted(&self, kind: ResourceKind, capacity: u16) -> GfxResult<Handle> {
        let err = GfxError::SlotsExhausted { kind, capacity };
        if self.strictness.is_strict() {
            return Err(err);
        }
        log::error!("{err}");
        Ok(Handle::invalid(kind))
    }

    fn native_or_inert(&self, handle: Handle, created: Result<NativeId, BackendError>) -> NativeId {
        match created {
            Ok(native) => {
                if self.debug.contains(DebugFlags::RESOURCES) {
                    log::debug!("created {handle} -> native {}", native.0);
                }
                native
            }
            Err(err) => {
                log::error!("{handle}: {err}; handle stays inert");
                NativeId::NONE
            }
        }
    }
}

/// Byte length of a buffer as stored in its record.
fn buffer_size(len: usize) -> Result<u32, BackendError> {
    u32::try_from(len).map_err(|_| {
        BackendError::Creation(format!("buffer of {len} bytes exceeds {} bytes", u32::MAX))
    })
}
