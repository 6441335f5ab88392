//! # End-to-End Streaming Tests
//!
//! The whole stack through the `TerrainStreamer` facade: planning, worker
//! pipelines, pooled placement and the backend boundary.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use horizon::procedural::{CollisionShape, ConstantField, MeshGeometry};
use horizon::streaming::plan;
use horizon::{
    ChunkCoord, RecordingBackend, RenderBackend, SharedViewpoint, StreamingConfig, TerrainStreamer, WorkerPool,
};

const DEADLINE: Duration = Duration::from_secs(180);

fn settle<B: RenderBackend, V: horizon::ViewpointSource>(streamer: &mut TerrainStreamer<B, V>) {
    let start = Instant::now();
    while !streamer.is_settled() {
        assert!(start.elapsed() < DEADLINE, "streamer never settled");
        streamer.tick(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(1));
    }
}

/// Test: Default configuration fills all 41 slots with the full ring set.
#[test]
fn test_full_ring_set_fills_pool() {
    let mut streamer = TerrainStreamer::with_parts(
        StreamingConfig::default(),
        RecordingBackend::new(),
        [0.0f32, 0.0, 0.0],
        WorkerPool::inline(),
        Arc::new(ConstantField(0.2)),
    )
    .unwrap();

    settle(&mut streamer);

    let backend = streamer.backend();
    assert_eq!(backend.slots().len(), 41);
    assert_eq!(backend.active_slots().count(), 41);
    assert_eq!(streamer.scheduler_stats().placed, 41);
    assert_eq!(streamer.scheduler_stats().pool_exhausted, 0);

    // Every slot sits at its chunk's world origin with a mesh as wide as its LOD.
    let batch = plan(ChunkCoord::ORIGIN, 4);
    for request in &batch {
        let label = request.coord.to_string();
        let slot = backend
            .active_slots()
            .find(|slot| slot.label == label)
            .unwrap_or_else(|| panic!("{label} not placed"));

        assert_eq!(slot.position, request.coord.world_origin(100.0));
        let mesh = slot.mesh.as_ref().unwrap();
        let width = 100.0 * request.lod.footprint() as f32;
        assert!((mesh.bounds.max[0] - width).abs() < 1e-2, "{label}: {}", mesh.bounds.max[0]);
        assert_eq!(slot.collision_enabled, request.lod.value() == 0);
    }
}

/// Backend that only counts, to check the trait is all an engine needs.
#[derive(Default)]
struct CountingBackend {
    instantiated: usize,
    visible: HashSet<u32>,
    meshes: usize,
    colliders: usize,
}

impl RenderBackend for CountingBackend {
    type Handle = u32;

    fn instantiate_render_slot(&mut self, index: usize) -> u32 {
        self.instantiated += 1;
        1000 + index as u32
    }

    fn set_active(&mut self, handle: &u32, active: bool) {
        if active {
            self.visible.insert(*handle);
        } else {
            self.visible.remove(handle);
        }
    }

    fn assign_mesh(&mut self, _handle: &u32, _geometry: Arc<MeshGeometry>) {
        self.meshes += 1;
    }

    fn set_world_position(&mut self, _handle: &u32, _position: [f32; 3]) {}

    fn set_collision_enabled(&mut self, _handle: &u32, _enabled: bool) {}

    fn set_collision_shape(&mut self, _handle: &u32, _shape: Arc<CollisionShape>) {
        self.colliders += 1;
    }
}

/// Test: A custom backend with its own handle type, on worker threads.
#[test]
fn test_custom_backend_on_threads() {
    let config = StreamingConfig {
        max_lod: 1,
        worker_threads: 2,
        ..StreamingConfig::default()
    };
    let mut streamer = TerrainStreamer::with_parts(
        config,
        CountingBackend::default(),
        [0.0f32, 0.0, 0.0],
        WorkerPool::new(2).unwrap(),
        Arc::new(ConstantField(0.4)),
    )
    .unwrap();

    settle(&mut streamer);

    let backend = streamer.backend();
    assert_eq!(backend.instantiated, 17);
    assert_eq!(backend.visible.len(), 17);
    assert!(backend.visible.iter().all(|handle| (1000..1017).contains(handle)));
    assert_eq!(backend.meshes, 17);
    assert_eq!(backend.colliders, 9);
}

/// Test: A viewpoint moved from another thread is picked up on the next plan.
#[test]
fn test_shared_viewpoint_drives_replans() {
    let config = StreamingConfig {
        max_lod: 1,
        ..StreamingConfig::default()
    };
    let camera = SharedViewpoint::new([0.0, 0.0, 0.0]);
    let mut streamer = TerrainStreamer::with_parts(
        config,
        RecordingBackend::new(),
        camera.clone(),
        WorkerPool::inline(),
        Arc::new(ConstantField(0.0)),
    )
    .unwrap();

    settle(&mut streamer);

    let mover = camera.clone();
    thread::spawn(move || mover.set([-1250.0, 0.0, 730.0])).join().unwrap();

    assert!(streamer.tick(Duration::from_secs(1)));
    settle(&mut streamer);

    let center = ChunkCoord::new(-13, 7);
    assert_eq!(streamer.planner().center(), Some(center));
    assert!(streamer.scheduler().pool().slot_of(center).is_some());
    assert_eq!(streamer.scheduler().pool().occupied_count(), 17);
    // Old nodes far outside the retention radius were dropped.
    assert!(streamer.scheduler().node(ChunkCoord::ORIGIN).is_none());
    assert!(streamer.scheduler_stats().nodes_pruned > 0);
}
