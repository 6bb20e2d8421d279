//! wgpu implementation of [`GraphicsBackend`].
//!
//! wgpu has no mutable pipeline state, so the GL-shaped calls coming out of
//! replay are folded into a current-state record. Each draw snapshots that
//! record into a [`PipelineKey`] (cached pipelines) and a copy of the program's
//! uniform block (dynamic offset into one per-frame uniform buffer). The whole
//! frame is encoded into a single render pass at [`end_frame`](GraphicsBackend::end_frame).
//!
//! Binding model, shared by every program:
//! - group 0, binding 0: the program's uniform block (`var<uniform>`), at most
//!   [`UNIFORM_BLOCK_LIMIT`] bytes, members in allocation order with WGSL alignment
//! - group 1, bindings `2n` / `2n + 1`: texture and sampler of stage `n`
//!
//! Vertex entry point must be `vs_main`, fragment entry point `fs_main`.

mod convert;
mod init;
mod pipeline;

pub use init::WgpuInit;

use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::config::{MAX_TEXTURE_STAGES, MAX_VERTEX_STREAMS};
use crate::error::BackendError;
use crate::handle::ResourceKind;
use crate::queue::{
    BlendMode, ColorMask, CompareFunc, PrimitiveType, RenderState, ScissorRect, StencilState,
    UniformType,
};
use crate::resource::{Image, IndexFormat, SamplerDesc, VertexLayout};

use super::{GraphicsBackend, NativeId};
use pipeline::{PipelineCache, PipelineKey, PipelineSources, DEPTH_FORMAT};

/// Largest uniform block a program may declare, in bytes.
pub const UNIFORM_BLOCK_LIMIT: u32 = 1024;

const INITIAL_UNIFORM_BUFFER: u64 = 64 * 1024;

/// Color attachment the next frames render into.
#[derive(Debug, Clone)]
pub struct WgpuTarget {
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    /// Clear color; `None` loads the existing contents.
    pub clear: Option<wgpu::Color>,
}

// ── native objects ────────────────────────────────────────────────────────

struct GpuBuffer {
    buffer: wgpu::Buffer,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct GpuProgram {
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    source: String,
    /// Current uniform values in block layout.
    block: Vec<u8>,
    /// Block placement by uniform name: (offset, len).
    members: HashMap<String, (u32, u32)>,
}

#[derive(Debug, Copy, Clone)]
struct GpuUniform {
    program: NativeId,
    /// `None` for samplers, which live in group 1.
    placement: Option<(u32, u32)>,
}

// ── per-frame recording ───────────────────────────────────────────────────

#[derive(Debug, Copy, Clone)]
enum DrawRange {
    Indexed { first: u32, count: u32, base_vertex: u32 },
    Direct { first: u32, count: u32 },
}

#[derive(Debug, Clone)]
struct DrawOp {
    pipeline: usize,
    uniform_offset: u32,
    textures: [NativeId; MAX_TEXTURE_STAGES],
    vertex: [NativeId; MAX_VERTEX_STREAMS],
    streams: usize,
    index: Option<(NativeId, IndexFormat)>,
    scissor: Option<ScissorRect>,
    stencil_reference: u32,
    range: DrawRange,
}

/// State accumulated from the GL-shaped calls since the last draw.
#[derive(Debug, Clone)]
struct CurrentState {
    state: RenderState,
    stencil: Option<StencilState>,
    scissor: Option<ScissorRect>,
    program: NativeId,
    textures: [NativeId; MAX_TEXTURE_STAGES],
    vertex: [Option<(NativeId, VertexLayout)>; MAX_VERTEX_STREAMS],
    index: Option<(NativeId, IndexFormat)>,
    /// Offset of the current program's uniform snapshot; `None` once it is stale.
    uniform_offset: Option<u32>,
}

impl CurrentState {
    fn new(defaults: RenderState) -> Self {
        Self {
            state: defaults,
            stencil: None,
            scissor: None,
            program: NativeId::NONE,
            textures: [NativeId::NONE; MAX_TEXTURE_STAGES],
            vertex: Default::default(),
            index: None,
            uniform_offset: None,
        }
    }

    /// Folds the accumulated state into the key of the pipeline a draw needs.
    ///
    /// The stencil reference is a dynamic pass setting, so it is zeroed here.
    /// Only the leading run of bound vertex streams becomes part of the layout.
    fn pipeline_key(&self, primitive: PrimitiveType) -> PipelineKey {
        let vertex_layouts = self
            .vertex
            .iter()
            .map_while(|stream| stream.as_ref().map(|(_, layout)| layout.clone()))
            .collect();

        PipelineKey {
            program: self.program,
            blend: self.state.blend(),
            color_mask: self.state.color_mask(),
            depth_test: self.state.depth_test(),
            depth_write: self.state.depth_write(),
            primitive,
            stencil: self.stencil.map(|s| StencilState { reference: 0, ..s }),
            vertex_layouts,
        }
    }

    #[inline]
    fn mark_uniforms_dirty(&mut self) {
        self.uniform_offset = None;
    }

    /// Offset of `block` in `staging`, appending a fresh copy only when the
    /// previous snapshot has been marked dirty.
    fn snapshot_uniforms(&mut self, staging: &mut Vec<u8>, block: &[u8], alignment: u32) -> u32 {
        if let Some(offset) = self.uniform_offset {
            return offset;
        }
        let offset = append_aligned(staging, block, alignment);
        self.uniform_offset = Some(offset);
        offset
    }
}

/// Appends `block` to `staging` at the next multiple of `alignment`.
fn append_aligned(staging: &mut Vec<u8>, block: &[u8], alignment: u32) -> u32 {
    let offset = (staging.len() as u32).next_multiple_of(alignment);
    staging.resize(offset as usize, 0);
    staging.extend_from_slice(block);
    offset
}

/// [`GraphicsBackend`] rendering through wgpu.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,

    target: Option<WgpuTarget>,
    depth: Option<(wgpu::TextureView, u32, u32)>,

    next_id: u32,
    index_buffers: HashMap<NativeId, GpuBuffer>,
    vertex_buffers: HashMap<NativeId, GpuBuffer>,
    textures: HashMap<NativeId, GpuTexture>,
    programs: HashMap<NativeId, GpuProgram>,
    uniforms: HashMap<NativeId, GpuUniform>,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    fallback: GpuTexture,

    pipelines: PipelineCache,
    texture_groups: HashMap<[NativeId; MAX_TEXTURE_STAGES], wgpu::BindGroup>,

    uniform_buffer: wgpu::Buffer,
    uniform_capacity: u64,
    uniform_group: wgpu::BindGroup,
    uniform_alignment: u32,

    current: CurrentState,
    ops: Vec<DrawOp>,
    staging: Vec<u8>,
    warned_no_target: bool,
}

impl WgpuBackend {
    /// Wraps an existing device. Pipelines target `format`.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kestrel uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..MAX_TEXTURE_STAGES as u32)
            .flat_map(|stage| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: stage * 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: stage * 2 + 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kestrel texture bgl"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kestrel pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let fallback = upload_texture(
            &device,
            &queue,
            &Image::rgba8(1, 1, &[0xff; 4]),
            SamplerDesc::PIXEL,
        );

        let uniform_buffer = create_uniform_buffer(&device, INITIAL_UNIFORM_BUFFER);
        let uniform_group = create_uniform_group(&device, &uniform_layout, &uniform_buffer);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment;

        Self {
            device,
            queue,
            format,
            target: None,
            depth: None,
            next_id: 0,
            index_buffers: HashMap::new(),
            vertex_buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            uniforms: HashMap::new(),
            uniform_layout,
            texture_layout,
            pipeline_layout,
            fallback,
            pipelines: PipelineCache::default(),
            texture_groups: HashMap::new(),
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_BUFFER,
            uniform_group,
            uniform_alignment,
            current: CurrentState::new(RenderState::DEFAULT),
            ops: Vec::new(),
            staging: Vec::new(),
            warned_no_target: false,
        }
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Installs the color attachment for subsequent frames.
    pub fn set_target(&mut self, target: WgpuTarget) {
        self.target = Some(target);
        self.warned_no_target = false;
    }

    pub fn clear_target(&mut self) -> Option<WgpuTarget> {
        self.target.take()
    }

    /// Creates a texture usable as a render target in the backend's format.
    ///
    /// The texture can be copied out (`COPY_SRC`) or sampled afterwards.
    pub fn create_offscreen_target(
        &self,
        width: u32,
        height: u32,
        clear: Option<wgpu::Color>,
    ) -> (wgpu::Texture, WgpuTarget) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kestrel offscreen target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target = WgpuTarget {
            view,
            width: width.max(1),
            height: height.max(1),
            clear,
        };
        (texture, target)
    }

    /// Pipelines built so far.
    #[inline]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn alloc_id(&mut self) -> NativeId {
        self.next_id += 1;
        NativeId(self.next_id)
    }

    // ── frame encoding ────────────────────────────────────────────────────

    fn ensure_depth(&mut self, width: u32, height: u32) {
        if matches!(self.depth, Some((_, w, h)) if w == width && h == height) {
            return;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kestrel depth-stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some((view, width, height));
    }

    fn ensure_uniform_capacity(&mut self, required: u64) {
        if required <= self.uniform_capacity {
            return;
        }

        let capacity = required.next_power_of_two();
        log::debug!("uniform buffer grows {} -> {capacity} bytes", self.uniform_capacity);
        self.uniform_buffer = create_uniform_buffer(&self.device, capacity);
        self.uniform_group =
            create_uniform_group(&self.device, &self.uniform_layout, &self.uniform_buffer);
        self.uniform_capacity = capacity;
    }

    fn ensure_texture_group(&mut self, textures: [NativeId; MAX_TEXTURE_STAGES]) {
        if self.texture_groups.contains_key(&textures) {
            return;
        }

        let resolved: Vec<&GpuTexture> = textures
            .iter()
            .map(|id| self.textures.get(id).unwrap_or(&self.fallback))
            .collect();

        let entries: Vec<wgpu::BindGroupEntry<'_>> = resolved
            .iter()
            .enumerate()
            .flat_map(|(stage, tex)| {
                [
                    wgpu::BindGroupEntry {
                        binding: stage as u32 * 2,
                        resource: wgpu::BindingResource::TextureView(&tex.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: stage as u32 * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(&tex.sampler),
                    },
                ]
            })
            .collect();

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kestrel texture bind group"),
            layout: &self.texture_layout,
            entries: &entries,
        });
        self.texture_groups.insert(textures, group);
    }

    /// Snapshots the current program's uniform block into the frame's staging area.
    fn snapshot_uniforms(&mut self) -> u32 {
        let block = self
            .programs
            .get(&self.current.program)
            .map_or(&[][..], |p| p.block.as_slice());
        self.current
            .snapshot_uniforms(&mut self.staging, block, self.uniform_alignment)
    }

    fn record_draw(&mut self, primitive: PrimitiveType, range: DrawRange) {
        let program_id = self.current.program;
        let Some(program) = self.programs.get(&program_id) else {
            log::warn!("draw with unknown program {}", program_id.0);
            return;
        };

        let key = self.current.pipeline_key(primitive);

        let device = &self.device;
        let sources = PipelineSources {
            vertex: &program.vertex,
            fragment: &program.fragment,
            layout: &self.pipeline_layout,
            color_format: self.format,
        };
        let pipeline = self
            .pipelines
            .get_or_create(&key, || pipeline::create_pipeline(device, &key, sources));

        let streams = key.vertex_layouts.len();
        let mut vertex = [NativeId::NONE; MAX_VERTEX_STREAMS];
        for (slot, stream) in vertex.iter_mut().zip(&self.current.vertex) {
            if let Some((id, _)) = stream {
                *slot = *id;
            }
        }

        let uniform_offset = self.snapshot_uniforms();
        self.ops.push(DrawOp {
            pipeline,
            uniform_offset,
            textures: self.current.textures,
            vertex,
            streams,
            index: self.current.index,
            scissor: self.current.scissor,
            stencil_reference: self.current.stencil.map_or(0, |s| s.reference as u32),
            range,
        });
    }

    fn encode_frame(&mut self, ops: &[DrawOp]) {
        let Some((width, height)) = self.target.as_ref().map(|t| (t.width, t.height)) else {
            if !self.warned_no_target {
                log::warn!("wgpu backend has no target; {} draws skipped", ops.len());
                self.warned_no_target = true;
            }
            return;
        };

        self.ensure_depth(width, height);
        if !self.staging.is_empty() {
            self.ensure_uniform_capacity(self.staging.len() as u64 + UNIFORM_BLOCK_LIMIT as u64);
            self.queue.write_buffer(&self.uniform_buffer, 0, &self.staging);
        }
        for op in ops {
            self.ensure_texture_group(op.textures);
        }

        let (Some(target), Some((depth_view, _, _))) = (self.target.as_ref(), self.depth.as_ref())
        else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kestrel frame encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kestrel frame pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: target.clear.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let mut bound_pipeline = None;
            for op in ops {
                let Some(pipeline) = self.pipelines.get(op.pipeline) else {
                    continue;
                };
                let Some(textures) = self.texture_groups.get(&op.textures) else {
                    continue;
                };

                let (sx, sy, sw, sh) = match op.scissor {
                    Some(rect) => {
                        let x = rect.x.min(width);
                        let y = rect.y.min(height);
                        (x, y, rect.width.min(width - x), rect.height.min(height - y))
                    }
                    None => (0, 0, width, height),
                };
                if sw == 0 || sh == 0 {
                    continue;
                }

                let vertex: Option<Vec<&wgpu::Buffer>> = op.vertex[..op.streams]
                    .iter()
                    .map(|id| self.vertex_buffers.get(id).map(|b| &b.buffer))
                    .collect();
                let Some(vertex) = vertex else {
                    continue;
                };

                if bound_pipeline != Some(op.pipeline) {
                    rpass.set_pipeline(pipeline);
                    bound_pipeline = Some(op.pipeline);
                }
                rpass.set_bind_group(0, &self.uniform_group, &[op.uniform_offset]);
                rpass.set_bind_group(1, textures, &[]);
                rpass.set_scissor_rect(sx, sy, sw, sh);
                rpass.set_stencil_reference(op.stencil_reference);
                for (slot, buffer) in vertex.iter().enumerate() {
                    rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }

                match op.range {
                    DrawRange::Indexed {
                        first,
                        count,
                        base_vertex,
                    } => {
                        let Some(index) = op
                            .index
                            .and_then(|(id, format)| Some((self.index_buffers.get(&id)?, format)))
                        else {
                            continue;
                        };
                        rpass.set_index_buffer(
                            index.0.buffer.slice(..),
                            convert::index_format(index.1),
                        );
                        rpass.draw_indexed(first..first + count, base_vertex as i32, 0..1);
                    }
                    DrawRange::Direct { first, count } => {
                        rpass.draw(first..first + count, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl GraphicsBackend for WgpuBackend {
    fn create_index_buffer(
        &mut self,
        data: &[u8],
        format: IndexFormat,
    ) -> Result<NativeId, BackendError> {
        if data.is_empty() || data.len() % format.size() as usize != 0 {
            return Err(BackendError::Creation(format!(
                "index data of {} bytes is not a whole number of {format:?} indices",
                data.len()
            )));
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kestrel index buffer"),
                contents: data,
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = self.alloc_id();
        self.index_buffers.insert(id, GpuBuffer { buffer });
        Ok(id)
    }

    fn create_vertex_buffer(
        &mut self,
        data: &[u8],
        layout: &VertexLayout,
    ) -> Result<NativeId, BackendError> {
        if data.is_empty() {
            return Err(BackendError::Creation("empty vertex buffer".into()));
        }
        if layout.stride == 0 {
            return Err(BackendError::Creation("vertex layout has zero stride".into()));
        }

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kestrel vertex buffer"),
                contents: data,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = self.alloc_id();
        self.vertex_buffers.insert(id, GpuBuffer { buffer });
        Ok(id)
    }

    fn create_texture(
        &mut self,
        image: &Image<'_>,
        sampler: SamplerDesc,
    ) -> Result<NativeId, BackendError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if image.width == 0 || image.height == 0 || image.width > max || image.height > max {
            return Err(BackendError::Unsupported(format!(
                "texture size {}x{} (limit {max})",
                image.width, image.height
            )));
        }

        let texture = upload_texture(&self.device, &self.queue, image, sampler);
        let id = self.alloc_id();
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn create_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<NativeId, BackendError> {
        if !vertex_src.contains("vs_main") {
            return Err(BackendError::ShaderCompile("vertex source has no `vs_main`".into()));
        }
        if !fragment_src.contains("fs_main") {
            return Err(BackendError::ShaderCompile("fragment source has no `fs_main`".into()));
        }

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kestrel vertex shader"),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("kestrel fragment shader"),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let id = self.alloc_id();
        self.programs.insert(
            id,
            GpuProgram {
                vertex,
                fragment,
                source: format!("{vertex_src}\n{fragment_src}"),
                block: Vec::new(),
                members: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn create_uniform(
        &mut self,
        program: NativeId,
        name: &str,
        ty: UniformType,
        count: u8,
    ) -> Result<NativeId, BackendError> {
        let Some(gpu_program) = self.programs.get_mut(&program) else {
            return Err(BackendError::Creation(format!("unknown program {}", program.0)));
        };
        if !gpu_program.source.contains(name) {
            return Err(BackendError::UniformNotFound(name.to_owned()));
        }

        let placement = if ty == UniformType::Sampler {
            None
        } else if let Some(&placed) = gpu_program.members.get(name) {
            Some(placed)
        } else {
            let offset = (gpu_program.block.len() as u32).next_multiple_of(convert::uniform_align(ty, count));
            let len = convert::uniform_block_len(ty, count);
            if offset + len > UNIFORM_BLOCK_LIMIT {
                return Err(BackendError::Unsupported(format!(
                    "uniform `{name}` does not fit in a {UNIFORM_BLOCK_LIMIT}-byte block"
                )));
            }
            gpu_program.block.resize((offset + len) as usize, 0);
            gpu_program.members.insert(name.to_owned(), (offset, len));
            Some((offset, len))
        };

        let id = self.alloc_id();
        self.uniforms.insert(id, GpuUniform { program, placement });
        Ok(id)
    }

    fn destroy(&mut self, kind: ResourceKind, id: NativeId) {
        let found = match kind {
            ResourceKind::IndexBuffer => self.index_buffers.remove(&id).is_some(),
            ResourceKind::VertexBuffer => self.vertex_buffers.remove(&id).is_some(),
            ResourceKind::Texture => {
                self.texture_groups.retain(|ids, _| !ids.contains(&id));
                self.textures.remove(&id).is_some()
            }
            ResourceKind::Program => {
                self.pipelines.evict_program(id);
                self.programs.remove(&id).is_some()
            }
            ResourceKind::Uniform => self.uniforms.remove(&id).is_some(),
        };
        if !found {
            log::debug!("destroy of unknown {kind} {}", id.0);
        }
    }

    fn begin_frame(&mut self, defaults: RenderState) {
        self.current = CurrentState::new(defaults);
        self.ops.clear();
        self.staging.clear();
    }

    fn end_frame(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.encode_frame(&ops);
        self.ops = ops;
        self.ops.clear();
        self.staging.clear();
    }

    fn set_scissor(&mut self, rect: Option<ScissorRect>) {
        self.current.scissor = rect;
    }

    fn set_stencil(&mut self, stencil: Option<StencilState>) {
        self.current.stencil = stencil;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.current.state = self.current.state.with_depth_write(enabled);
    }

    fn set_depth_test(&mut self, func: Option<CompareFunc>) {
        self.current.state = self.current.state.with_depth_test(func);
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.current.state = self.current.state.with_color_mask(mask);
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.current.state = self.current.state.with_blend(mode);
    }

    fn set_primitive(&mut self, primitive: PrimitiveType) {
        self.current.state = self.current.state.with_primitive(primitive);
    }

    fn use_program(&mut self, program: NativeId) {
        self.current.program = program;
        self.current.mark_uniforms_dirty();
    }

    fn set_uniform(&mut self, uniform: NativeId, ty: UniformType, count: u8, data: &[u8]) {
        let Some(&GpuUniform { program, placement }) = self.uniforms.get(&uniform) else {
            return;
        };
        // Samplers are bound by stage in group 1.
        let Some((offset, len)) = placement else {
            return;
        };
        let Some(gpu_program) = self.programs.get_mut(&program) else {
            return;
        };

        let range = offset as usize..(offset + len) as usize;
        if let Some(dst) = gpu_program.block.get_mut(range) {
            convert::write_uniform_block(dst, ty, count, data);
        }
        if program == self.current.program {
            self.current.mark_uniforms_dirty();
        }
    }

    fn bind_texture(&mut self, stage: u8, _sampler: NativeId, texture: NativeId) {
        if let Some(slot) = self.current.textures.get_mut(stage as usize) {
            *slot = texture;
        }
    }

    fn bind_index_buffer(&mut self, buffer: NativeId, format: IndexFormat) {
        self.current.index = Some((buffer, format));
    }

    fn bind_vertex_buffer(&mut self, stream: u8, buffer: NativeId, layout: &VertexLayout) {
        if let Some(slot) = self.current.vertex.get_mut(stream as usize) {
            *slot = Some((buffer, layout.clone()));
        }
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
        base_vertex: u32,
    ) {
        self.record_draw(
            primitive,
            DrawRange::Indexed {
                first: first_index,
                count: index_count,
                base_vertex,
            },
        );
    }

    fn draw(&mut self, primitive: PrimitiveType, first_vertex: u32, vertex_count: u32) {
        self.record_draw(
            primitive,
            DrawRange::Direct {
                first: first_vertex,
                count: vertex_count,
            },
        );
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("format", &self.format)
            .field("programs", &self.programs.len())
            .field("textures", &self.textures.len())
            .field("pipelines", &self.pipelines.len())
            .finish_non_exhaustive()
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &Image<'_>,
    sampler: SamplerDesc,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("kestrel texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: convert::texture_format(image.format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels[..image.expected_len().min(image.pixels.len())],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.width * image.format.bytes_per_pixel()),
            rows_per_image: Some(image.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&convert::sampler_descriptor(sampler));
    GpuTexture {
        _texture: texture,
        view,
        sampler,
    }
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("kestrel uniform buffer"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("kestrel uniform bind group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: NonZeroU64::new(UNIFORM_BLOCK_LIMIT as u64),
            }),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::StencilOp;
    use crate::resource::VertexFormat;

    fn layout(location: u32) -> VertexLayout {
        VertexLayout::default().push(location, VertexFormat::Float32x2)
    }

    fn stencil(reference: u8) -> StencilState {
        StencilState {
            func: CompareFunc::Equal,
            reference,
            read_mask: 0xff,
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Replace,
        }
    }

    // ── pipeline keys ─────────────────────────────────────────────────────

    #[test]
    fn stencil_reference_is_not_part_of_the_key() {
        let mut current = CurrentState::new(RenderState::DEFAULT);
        current.program = NativeId(3);
        current.stencil = Some(stencil(7));
        let a = current.pipeline_key(PrimitiveType::Triangles);
        current.stencil = Some(stencil(200));
        let b = current.pipeline_key(PrimitiveType::Triangles);

        assert_eq!(a, b);
        assert_eq!(a.stencil.map(|s| s.reference), Some(0));
        assert_eq!(a.stencil.map(|s| s.func), Some(CompareFunc::Equal));
    }

    #[test]
    fn key_takes_only_leading_bound_streams() {
        let mut current = CurrentState::new(RenderState::DEFAULT);
        current.vertex[0] = Some((NativeId(1), layout(0)));
        assert_eq!(current.pipeline_key(PrimitiveType::Triangles).vertex_layouts, vec![layout(0)]);

        current.vertex[0] = None;
        current.vertex[1] = Some((NativeId(2), layout(1)));
        assert!(current.pipeline_key(PrimitiveType::Triangles).vertex_layouts.is_empty());
    }

    #[test]
    fn key_follows_state_and_primitive() {
        let state = RenderState::DEFAULT.with_blend(BlendMode::Additive).with_depth_write(true);
        let current = CurrentState::new(state);

        let key = current.pipeline_key(PrimitiveType::Lines);
        assert_eq!(key.blend, BlendMode::Additive);
        assert!(key.depth_write);
        assert_eq!(key.primitive, PrimitiveType::Lines);
        assert_ne!(key, current.pipeline_key(PrimitiveType::Triangles));
    }

    // ── uniform snapshots ─────────────────────────────────────────────────

    #[test]
    fn snapshots_start_on_alignment_boundaries() {
        let mut staging = Vec::new();
        assert_eq!(append_aligned(&mut staging, &[1; 16], 256), 0);
        assert_eq!(append_aligned(&mut staging, &[2; 300], 256), 256);
        assert_eq!(append_aligned(&mut staging, &[3; 4], 256), 768);
        assert_eq!(staging.len(), 772);
        assert_eq!(staging[256], 2);
        assert!(staging[16..256].iter().all(|&b| b == 0));
    }

    #[test]
    fn snapshot_is_reused_until_marked_dirty() {
        let mut current = CurrentState::new(RenderState::DEFAULT);
        let mut staging = Vec::new();

        let first = current.snapshot_uniforms(&mut staging, &[1; 32], 256);
        let again = current.snapshot_uniforms(&mut staging, &[9; 32], 256);
        assert_eq!(first, again);
        assert_eq!(staging.len(), 32);

        current.mark_uniforms_dirty();
        let fresh = current.snapshot_uniforms(&mut staging, &[9; 32], 256);
        assert_eq!(fresh, 256);
        assert_eq!(&staging[256..], &[9; 32]);
    }
}
