//! # Generation Pipeline Tests
//!
//! Drives heightmap → mesh → collision on real worker threads the way a
//! scheduler would: poll once per "tick", never block.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use horizon_core::{CancellationToken, ChunkCoord, LodScale, WorkerPool};
use horizon_procedural::{
    ErodedFractalField, HeightmapGenerator, HeightmapOutcome, MeshBuilder, WorldSeed,
    DEFAULT_RESOLUTION_ADJUSTMENT,
};

const TICK: Duration = Duration::from_millis(1);
const DEADLINE: Duration = Duration::from_secs(60);

fn heightmap_generator() -> HeightmapGenerator {
    HeightmapGenerator::new(
        Arc::new(ErodedFractalField::new(WorldSeed::new(2024))),
        100.0,
        DEFAULT_RESOLUTION_ADJUSTMENT,
    )
}

/// Test: Full pipeline for a finest and a coarse chunk.
#[test]
fn test_pipeline_on_threads() {
    let workers = WorkerPool::new(2).unwrap();
    let heightmaps = heightmap_generator();
    let meshes = MeshBuilder::new(workers.clone());

    for scale in [LodScale::FINEST, LodScale::uniform(9)] {
        let token = CancellationToken::new();
        let mut job = heightmaps.generate(&workers, ChunkCoord::new(1, 2), scale, token.clone());

        let start = Instant::now();
        while job.next() == Some(false) {
            assert!(start.elapsed() < DEADLINE);
            thread::sleep(TICK);
        }

        let Some(HeightmapOutcome::Ready(heightmap)) = job.take_outcome() else {
            panic!("heightmap did not complete");
        };

        let size = [100.0 * scale.x as f32, 100.0 * scale.y as f32];
        let artifact = meshes.build(heightmap, size, scale, 1000.0, token);

        while !artifact.is_complete() {
            assert!(start.elapsed() < DEADLINE);
            thread::sleep(TICK);
        }

        let geometry = artifact.geometry().unwrap();
        assert_eq!(geometry.bounds.max[0], size[0]);
        assert_eq!(artifact.collision().is_some(), scale.is_finest());
    }
}

/// Test: Cancelling mid-flight publishes nothing and keeps workers usable.
#[test]
fn test_cancel_in_flight() {
    let workers = WorkerPool::new(1).unwrap();
    let heightmaps = heightmap_generator();

    let token = CancellationToken::new();
    let mut job = heightmaps.generate(&workers, ChunkCoord::ORIGIN, LodScale::FINEST, token.clone());
    token.cancel();

    let start = Instant::now();
    while job.next() == Some(false) {
        assert!(start.elapsed() < DEADLINE);
        thread::sleep(TICK);
    }

    // The fill may have finished before the cancel landed; both are fine,
    // but a cancelled one must not carry data.
    match job.take_outcome() {
        Some(HeightmapOutcome::Ready(_) | HeightmapOutcome::Cancelled) => {}
        other => panic!("unexpected outcome {other:?}"),
    }

    let mut next = heightmaps.generate(&workers, ChunkCoord::ORIGIN, LodScale::FINEST, CancellationToken::new());
    while next.next() == Some(false) {
        assert!(start.elapsed() < DEADLINE);
        thread::sleep(TICK);
    }
    assert!(matches!(next.take_outcome(), Some(HeightmapOutcome::Ready(_))));
}
