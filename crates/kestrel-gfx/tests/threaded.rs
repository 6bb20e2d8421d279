//! Recording on one thread, replaying on another.
//!
//! The queue hands sorted frames over a channel; the replay side draws them,
//! executes their deferred frees, and sends them back so the recorder can
//! reuse their allocations. Two spare frames let the recorder run one frame
//! ahead of replay.

use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;

use kestrel_gfx::backend::{BackendCall, RecordingBackend};
use kestrel_gfx::handle::{Handle, ResourceKind};
use kestrel_gfx::logging::DebugFlags;
use kestrel_gfx::queue::{Frame, RenderQueue};
use kestrel_gfx::render::RenderContext;
use kestrel_gfx::resource::{IndexFormat, ResourceManager, VertexLayout};
use kestrel_gfx::{GfxConfig, Strictness};

const SPARE_FRAMES: usize = 2;
const DRAWS_PER_FRAME: u32 = 5;

fn record_draws(queue: &mut RenderQueue, program: Handle, vb: Handle, ib: Handle) {
    for i in 0..DRAWS_PER_FRAME {
        queue.set_vertex_buffer(0, vb, 0, 32).unwrap();
        queue.set_index_buffer(ib, 0, 6).unwrap();
        queue.submit(0, program, DRAWS_PER_FRAME - i, false).unwrap();
    }
}

fn vertex_buffer(resources: &RwLock<ResourceManager>, backend: &mut RecordingBackend) -> Handle {
    resources
        .write()
        .unwrap()
        .alloc_vertex_buffer(backend, &[0u8; 8 * 32], VertexLayout::with_stride(8))
        .unwrap()
}

#[test]
fn recording_overlaps_replay_and_frees_wait_for_it() {
    let config = GfxConfig {
        strictness: Strictness::Strict,
        ..Default::default()
    };

    // Allocation happens on the recording side with its own backend.
    let mut alloc_backend = RecordingBackend::new();
    let resources = Arc::new(RwLock::new(ResourceManager::new(
        &config.slots,
        config.strictness,
        DebugFlags::empty(),
    )));
    let (program, ib) = {
        let mut rm = resources.write().unwrap();
        let program = rm.alloc_program(&mut alloc_backend, "vs", "fs").unwrap();
        let ib = rm
            .alloc_index_buffer(&mut alloc_backend, &[0u8; 2 * 12], IndexFormat::U16)
            .unwrap();
        (program, ib)
    };
    let vb = vertex_buffer(&resources, &mut alloc_backend);
    let scratch = vertex_buffer(&resources, &mut alloc_backend);

    let (to_render, frames) = mpsc::channel::<Frame>();
    let (to_record, spares) = mpsc::channel::<Frame>();
    let (start, started) = mpsc::channel::<()>();
    for _ in 0..SPARE_FRAMES {
        to_record.send(Frame::new(&config)).unwrap();
    }

    let render_resources = Arc::clone(&resources);
    let renderer = thread::spawn(move || {
        let mut backend = RecordingBackend::new();
        let mut context = RenderContext::default();
        let mut draws = Vec::new();

        // Hold replay back until the recorder is a frame ahead.
        started.recv().unwrap();
        for frame in frames {
            let stats = {
                let resources = render_resources.read().unwrap();
                context.replay(&frame, &resources, &mut backend)
            };
            draws.push(stats.draw_calls);

            {
                let mut resources = render_resources.write().unwrap();
                for &handle in frame.deferred_frees() {
                    resources.free(&mut backend, handle).unwrap();
                }
            }

            if to_record.send(frame).is_err() {
                break;
            }
        }

        (draws, backend)
    });

    let mut queue = RenderQueue::new(&config);

    // Frame 0 draws from the scratch buffer and releases it.
    record_draws(&mut queue, program, scratch, ib);
    queue.defer_free(scratch);
    let frame = queue.end_frame(spares.recv().unwrap());
    assert!(frame.is_sorted());
    assert_eq!(frame.deferred_frees(), &[scratch]);
    to_render.send(frame).unwrap();

    // Frame 1 is recorded while frame 0 waits for replay; its slot stays taken.
    record_draws(&mut queue, program, vb, ib);
    let in_flight = vertex_buffer(&resources, &mut alloc_backend);
    assert_ne!(in_flight.slot(), scratch.slot());
    assert!(resources.read().unwrap().is_live(scratch));
    let frame = queue.end_frame(spares.recv().unwrap());
    assert_eq!(frame.len(), DRAWS_PER_FRAME as usize);
    to_render.send(frame).unwrap();
    start.send(()).unwrap();

    // Frame 2 needs a frame back from replay; frame 0 returns first.
    record_draws(&mut queue, program, vb, ib);
    let spare = spares.recv().unwrap();
    assert_eq!(spare.deferred_frees(), &[scratch]);
    assert!(!resources.read().unwrap().is_live(scratch));
    let reused = vertex_buffer(&resources, &mut alloc_backend);
    assert_eq!(reused, Handle::new(ResourceKind::VertexBuffer, scratch.slot()));

    let frame = queue.end_frame(spare);
    assert!(frame.deferred_frees().is_empty());
    to_render.send(frame).unwrap();
    drop(to_render);

    let (draws, backend) = renderer.join().unwrap();
    assert_eq!(draws, vec![DRAWS_PER_FRAME; 3]);
    assert_eq!(backend.count(|c| *c == BackendCall::BeginFrame), 3);
    assert_eq!(backend.count(BackendCall::is_draw), 3 * DRAWS_PER_FRAME as usize);
    assert_eq!(
        backend.count(|c| matches!(
            c,
            BackendCall::Destroy {
                kind: ResourceKind::VertexBuffer,
                ..
            }
        )),
        1
    );
}

#[test]
fn frames_are_send() {
    fn assert_send<T: Send>() {}
    assert_send::<Frame>();
    assert_send::<RenderContext>();
    assert_send::<ResourceManager>();
}
