use std::collections::HashMap;

use crate::backend::NativeId;
use crate::queue::{BlendMode, ColorMask, CompareFunc, PrimitiveType, StencilState};
use crate::resource::VertexLayout;

use super::convert;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Everything a wgpu render pipeline bakes in that the command layer treats as dynamic state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: NativeId,
    pub blend: BlendMode,
    pub color_mask: ColorMask,
    pub depth_test: Option<CompareFunc>,
    pub depth_write: bool,
    pub primitive: PrimitiveType,
    pub stencil: Option<StencilState>,
    /// Layouts of the leading bound vertex streams, in stream order.
    pub vertex_layouts: Vec<VertexLayout>,
}

/// Pipelines are created on first use and addressed by index for the rest of their life.
#[derive(Default)]
pub(super) struct PipelineCache {
    by_key: HashMap<PipelineKey, usize>,
    pipelines: Vec<Option<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        key: &PipelineKey,
        create: impl FnOnce() -> wgpu::RenderPipeline,
    ) -> usize {
        if let Some(&index) = self.by_key.get(key) {
            return index;
        }

        let index = self.pipelines.len();
        self.pipelines.push(Some(create()));
        self.by_key.insert(key.clone(), index);
        log::debug!("pipeline #{index} created for program {}", key.program.0);
        index
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(index)?.as_ref()
    }

    /// Drops every pipeline built from `program`.
    pub fn evict_program(&mut self, program: NativeId) {
        let pipelines = &mut self.pipelines;
        self.by_key.retain(|key, &mut index| {
            if key.program == program {
                pipelines[index] = None;
                false
            } else {
                true
            }
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}

pub(super) struct PipelineSources<'a> {
    pub vertex: &'a wgpu::ShaderModule,
    pub fragment: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    pub color_format: wgpu::TextureFormat,
}

pub(super) fn create_pipeline(
    device: &wgpu::Device,
    key: &PipelineKey,
    sources: PipelineSources<'_>,
) -> wgpu::RenderPipeline {
    let attributes: Vec<Vec<wgpu::VertexAttribute>> = key
        .vertex_layouts
        .iter()
        .map(|layout| {
            layout
                .attributes
                .iter()
                .map(|a| wgpu::VertexAttribute {
                    format: convert::vertex_format(a.format),
                    offset: a.offset as u64,
                    shader_location: a.location,
                })
                .collect()
        })
        .collect();

    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
        .vertex_layouts
        .iter()
        .zip(&attributes)
        .map(|(layout, attrs)| wgpu::VertexBufferLayout {
            array_stride: layout.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attrs,
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("kestrel pipeline"),
        layout: Some(sources.layout),

        vertex: wgpu::VertexState {
            module: sources.vertex,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: sources.fragment,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: sources.color_format,
                blend: convert::blend_state(key.blend),
                write_mask: convert::color_writes(key.color_mask),
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: convert::topology(key.primitive),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare: key
                .depth_test
                .map_or(wgpu::CompareFunction::Always, convert::compare),
            stencil: convert::stencil_state(key.stencil),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),

        multiview_mask: None,
        cache: None,
    })
}
