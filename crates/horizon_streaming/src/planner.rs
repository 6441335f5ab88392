//! # LOD Ring Planner
//!
//! Decides which chunks should exist around the viewpoint.
//!
//! The visible set is one level-0 chunk under the viewpoint plus
//! `max_lod + 1` square rings. Ring `L` is made of eight chunks of
//! `3^L × 3^L` base chunks each, arranged around the area covered by the
//! rings inside it:
//!
//! ```text
//!   ┌─────┬─────┬─────┐
//!   │ c02 │ c12 │ c22 │      ring L+1 surrounds ring L with tiles
//!   ├─────┼─────┼─────┤      three times as wide; together the
//!   │ c10 │inner│ c21 │      rings tile a (3^(L+1)) chunk square
//!   ├─────┼─────┼─────┤      with no gaps and no overlap
//!   │ c00 │ c01 │ c20 │
//!   └─────┴─────┴─────┘
//! ```
//!
//! Rows run from −x (top) to +x, columns from −y (left) to +y. Each tile
//! is named by its origin (lowest x, lowest y) chunk.

use std::time::Duration;

use horizon_core::{ChunkCoord, LodLevel};

use crate::backend::{RenderBackend, ViewpointSource};
use crate::config::StreamingConfig;
use crate::scheduler::{ChunkRequest, ChunkScheduler};

/// Diagonal origins of ring 0, relative to the centre chunk.
const BASE_DIAGONALS: [ChunkCoord; 4] = [
    ChunkCoord::new(1, -1),
    ChunkCoord::new(-1, -1),
    ChunkCoord::new(1, 1),
    ChunkCoord::new(-1, 1),
];

/// Offset of a diagonal tile origin at `level`, grown from its ring-0
/// position by `v ← 3v − (1, 1)` once per level.
#[must_use]
pub fn diagonal_offset(base: ChunkCoord, level: LodLevel) -> ChunkCoord {
    (0..level.value()).fold(base, |v, _| v * 3 + ChunkCoord::new(-1, -1))
}

/// The eight tile origins of one ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LodRing {
    /// Ring level; each tile spans `3^level` chunks per side.
    pub level: LodLevel,
    /// Diagonal tile at `+x, −y`.
    pub c00: ChunkCoord,
    /// Straight tile following `c00` along `+y`.
    pub c01: ChunkCoord,
    /// Diagonal tile at `−x, −y`.
    pub c02: ChunkCoord,
    /// Straight tile following `c00` along `−x`.
    pub c10: ChunkCoord,
    /// Straight tile following `c02` along `+y`.
    pub c12: ChunkCoord,
    /// Diagonal tile at `+x, +y`.
    pub c20: ChunkCoord,
    /// Straight tile following `c22` along `+x`.
    pub c21: ChunkCoord,
    /// Diagonal tile at `−x, +y`.
    pub c22: ChunkCoord,
}

impl LodRing {
    /// Computes ring `level` around `center`.
    #[must_use]
    pub fn new(level: LodLevel, center: ChunkCoord) -> Self {
        let [c00, c02, c20, c22] = BASE_DIAGONALS.map(|base| diagonal_offset(base, level));
        let side = level.footprint() as i32;

        Self {
            level,
            c00: c00 + center,
            c01: c00.offset(0, side) + center,
            c02: c02 + center,
            c10: c00.offset(-side, 0) + center,
            c12: c02.offset(0, side) + center,
            c20: c20 + center,
            c21: c22.offset(side, 0) + center,
            c22: c22 + center,
        }
    }

    /// The four corner tiles, in request order.
    #[must_use]
    pub const fn diagonals(&self) -> [ChunkCoord; 4] {
        [self.c00, self.c02, self.c20, self.c22]
    }

    /// The four edge tiles, in request order.
    #[must_use]
    pub const fn straights(&self) -> [ChunkCoord; 4] {
        [self.c01, self.c10, self.c12, self.c21]
    }

    /// All eight tiles, diagonals first.
    pub fn positions(&self) -> impl Iterator<Item = ChunkCoord> {
        self.diagonals().into_iter().chain(self.straights())
    }
}

/// Computes the full visible set around `center`: the centre chunk at
/// level 0, then rings `0..=max_lod`, diagonals before straights.
#[must_use]
pub fn plan(center: ChunkCoord, max_lod: u32) -> Vec<ChunkRequest> {
    let mut requests = Vec::with_capacity(1 + 8 * (max_lod as usize + 1));
    requests.push(ChunkRequest::new(center, LodLevel::FINEST));

    for level in 0..=max_lod {
        let ring = LodRing::new(LodLevel::new(level), center);
        requests.extend(ring.positions().map(|coord| ChunkRequest::new(coord, ring.level)));
    }
    requests
}

/// Cap on the ring extent used for centre clamping.
const MAX_EXTENT: i32 = 1 << 30;

/// Re-plans the visible set at a fixed interval.
///
/// Uses the same accumulator shape as a fixed-rate tick loop: time is
/// added every frame and a plan fires once the interval has elapsed.
#[derive(Debug)]
pub struct LodRingPlanner {
    interval: Duration,
    accumulator: Duration,
    chunk_size: f32,
    max_lod: u32,
    extent: i32,
    retention_radius: u32,
    previous_center: Option<ChunkCoord>,
    visible: Vec<ChunkRequest>,
    plans: u64,
}

impl LodRingPlanner {
    /// Creates a planner from a configuration.
    #[must_use]
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            interval: config.replan_interval(),
            accumulator: Duration::ZERO,
            chunk_size: config.chunk_size,
            max_lod: config.max_lod,
            extent: i32::try_from(config.ring_extent()).map_or(MAX_EXTENT, |extent| extent.min(MAX_EXTENT)),
            retention_radius: config.retention_radius(),
            previous_center: None,
            visible: Vec::new(),
            plans: 0,
        }
    }

    /// Advances the planner clock by `dt`.
    ///
    /// The first call always evaluates; afterwards one evaluation happens
    /// per elapsed interval. An evaluation re-plans only if the viewpoint
    /// has entered a new chunk. Returns `true` if a new batch was issued.
    pub fn update<B, V>(&mut self, dt: Duration, viewpoint: &V, scheduler: &mut ChunkScheduler<B>) -> bool
    where
        B: RenderBackend,
        V: ViewpointSource + ?Sized,
    {
        if self.previous_center.is_some() {
            self.accumulator += dt;
            if self.accumulator < self.interval {
                return false;
            }
        }
        self.accumulator = Duration::ZERO;

        let center = self.clamp_center(ChunkCoord::from_world_position(
            viewpoint.viewpoint_position(),
            self.chunk_size,
        ));
        if self.previous_center == Some(center) {
            return false;
        }

        self.replan(center, scheduler);
        true
    }

    /// Re-plans around `center` now, whether or not it moved.
    ///
    /// A centre too close to the edge of chunk space for the outer ring is
    /// moved inwards until the ring fits.
    pub fn force_replan<B: RenderBackend>(&mut self, center: ChunkCoord, scheduler: &mut ChunkScheduler<B>) {
        self.accumulator = Duration::ZERO;
        self.replan(self.clamp_center(center), scheduler);
    }

    /// Moves `center` inwards until every ring tile lies in chunk space.
    fn clamp_center(&self, center: ChunkCoord) -> ChunkCoord {
        let (lo, hi) = (i32::MIN + self.extent, i32::MAX - self.extent);
        ChunkCoord::new(center.x.clamp(lo, hi), center.y.clamp(lo, hi))
    }

    fn replan<B: RenderBackend>(&mut self, center: ChunkCoord, scheduler: &mut ChunkScheduler<B>) {
        for request in self.visible.drain(..) {
            // Chunks that never reached a slot only log.
            let _ = scheduler.destroy(request.coord);
        }

        let batch = plan(center, self.max_lod);
        tracing::debug!(%center, chunks = batch.len(), "re-planned visible set");

        self.visible.clone_from(&batch);
        scheduler.generate_batch(batch);
        scheduler.prune_nodes(center, self.retention_radius);

        self.previous_center = Some(center);
        self.plans += 1;
    }

    /// Chunk the last plan was centred on.
    #[must_use]
    pub const fn center(&self) -> Option<ChunkCoord> {
        self.previous_center
    }

    /// The last planned set.
    #[must_use]
    pub fn visible(&self) -> &[ChunkRequest] {
        &self.visible
    }

    /// Number of plans issued.
    #[must_use]
    pub const fn plan_count(&self) -> u64 {
        self.plans
    }
}
