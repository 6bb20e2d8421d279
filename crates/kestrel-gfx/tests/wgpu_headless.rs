//! Smoke test of the wgpu backend. Needs a GPU adapter, so it only runs on request:
//! `cargo test -p kestrel-gfx -- --ignored`.

use kestrel_gfx::backend::{WgpuBackend, WgpuInit};
use kestrel_gfx::queue::UniformType;
use kestrel_gfx::resource::{IndexFormat, VertexFormat, VertexLayout};
use kestrel_gfx::{GfxConfig, RenderDevice, Strictness};

const SHADER: &str = r#"
struct Block {
    tint: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u_block: Block;

@vertex
fn vs_main(@location(0) pos: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(pos, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return u_block.tint;
}
"#;

#[test]
#[ignore = "needs a GPU adapter"]
fn draws_a_quad_offscreen() {
    let backend = WgpuBackend::headless(WgpuInit::default()).unwrap();
    let (_texture, target) =
        backend.create_offscreen_target(64, 64, Some(wgpu::Color::BLACK));

    let config = GfxConfig {
        strictness: Strictness::Strict,
        ..Default::default()
    };
    let mut dev = RenderDevice::new(config, backend).unwrap();
    dev.backend_mut().set_target(target);

    let program = dev.alloc_program(SHADER, SHADER).unwrap();
    assert!(!dev.resources().native(program).unwrap().is_none());
    let tint = dev.alloc_uniform(program, "tint", UniformType::Vec4, 1).unwrap();

    let quad: [f32; 8] = [-0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, 0.5];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];
    let vb = dev
        .alloc_vertex_buffer(
            bytemuck::cast_slice(&quad),
            VertexLayout::default().push(0, VertexFormat::Float32x2),
        )
        .unwrap();
    let ib = dev
        .alloc_index_buffer(bytemuck::cast_slice(&indices), IndexFormat::U16)
        .unwrap();

    dev.set_uniform_pod(tint, &[1.0f32, 0.0, 0.0, 1.0]).unwrap();
    dev.set_vertex_buffer(0, vb, 0, 4).unwrap();
    dev.set_index_buffer(ib, 0, 6).unwrap();
    dev.submit(0, program, 0).unwrap();

    assert_eq!(dev.flush(), 1);
    assert_eq!(dev.last_frame_stats().draw_calls, 1);
    assert_eq!(dev.backend().pipeline_count(), 1);
}
