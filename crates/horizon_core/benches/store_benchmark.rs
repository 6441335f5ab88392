//! # Chunk Store and Pool Benchmark
//!
//! Lookup cost must not depend on how far the viewer has travelled.
//! Compares lookups near the origin with lookups a million chunks away,
//! and measures a full ring-set worth of pool churn.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use horizon_core::{ChunkCoord, ChunkObjectPool, ChunkStore, Direction};

#[derive(Default)]
struct Node {
    lod: u32,
}

fn filled_store(center: ChunkCoord, radius: i32) -> ChunkStore<Node> {
    let mut store = ChunkStore::new();
    for x in -radius..=radius {
        for y in -radius..=radius {
            store.locate_mut(center.offset(x, y)).lod = (x.abs() + y.abs()) as u32;
        }
    }
    store
}

// =============================================================================
// STORE
// =============================================================================

fn bench_store_lookup(c: &mut Criterion) {
    let near = ChunkCoord::ORIGIN;
    let far = ChunkCoord::new(1_000_000, -1_000_000);

    let near_store = filled_store(near, 40);
    let far_store = filled_store(far, 40);

    c.bench_function("store_lookup_near_origin", |b| {
        b.iter(|| black_box(near_store.node(black_box(near.offset(13, -7)))).map(|n| n.lod));
    });

    c.bench_function("store_lookup_far_from_origin", |b| {
        b.iter(|| black_box(far_store.node(black_box(far.offset(13, -7)))).map(|n| n.lod));
    });

    c.bench_function("store_neighbor_walk", |b| {
        b.iter(|| {
            let mut count = 0usize;
            for direction in Direction::ALL {
                if far_store.neighbor(far, direction).is_some() {
                    count += 1;
                }
            }
            black_box(count)
        });
    });
}

fn bench_store_locate_fresh(c: &mut Criterion) {
    c.bench_function("store_locate_81x81", |b| {
        b.iter(|| black_box(filled_store(ChunkCoord::ORIGIN, 40).len()));
    });
}

// =============================================================================
// POOL
// =============================================================================

fn bench_pool_churn(c: &mut Criterion) {
    let mut pool = ChunkObjectPool::with_capacity(41, |i| i);

    c.bench_function("pool_acquire_release_41", |b| {
        b.iter(|| {
            for i in 0..41 {
                let _ = black_box(pool.acquire(ChunkCoord::new(i, 0)));
            }
            for i in 0..41 {
                let _ = black_box(pool.release(ChunkCoord::new(i, 0)));
            }
        });
    });
}

criterion_group!(benches, bench_store_lookup, bench_store_locate_fresh, bench_pool_churn);
criterion_main!(benches);
