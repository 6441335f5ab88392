//! # Terrain Streamer
//!
//! One call per frame:
//!
//! ```text
//! Frame N:
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. PLAN      LodRingPlanner::update(dt, viewpoint)           │
//! │              └─ on interval, if the viewpoint changed chunk: │
//! │                 destroy old set, submit new batch, prune     │
//! │                                                              │
//! │ 2. SCHEDULE  ChunkScheduler::tick()                          │
//! │              ├─ start pipelines, hand off tickets            │
//! │              ├─ poll heightmaps, start meshes                │
//! │              └─ place finished meshes into pool slots        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_core::WorkerPool;
use horizon_procedural::NoiseField;
use horizon_streaming::{
    ChunkScheduler, LodRingPlanner, RenderBackend, SchedulerStats, StreamingConfig, StreamingResult,
    ViewpointSource,
};

/// Ticks slower than this are logged.
pub const SLOW_TICK: Duration = Duration::from_millis(4);

/// Timing of the streamer's own work, excluding worker time.
#[derive(Clone, Copy, Debug, Default)]
pub struct StreamerStats {
    /// Frames processed.
    pub frames: u64,
    /// Frames that issued a new plan.
    pub plans: u64,
    /// Sum of frame times in microseconds.
    pub total_us: u64,
    /// Slowest frame in microseconds.
    pub max_frame_us: u64,
    /// Frames slower than [`SLOW_TICK`].
    pub slow_frames: u64,
}

impl StreamerStats {
    /// Average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        (self.total_us as f64 / self.frames as f64) / 1000.0
    }
}

/// Streams terrain around a viewpoint into a render backend.
pub struct TerrainStreamer<B: RenderBackend, V: ViewpointSource> {
    scheduler: ChunkScheduler<B>,
    planner: LodRingPlanner,
    viewpoint: V,
    stats: StreamerStats,
}

impl<B: RenderBackend, V: ViewpointSource> TerrainStreamer<B, V> {
    /// Creates a streamer with threaded workers and configured terrain.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or workers that fail to start.
    pub fn new(config: StreamingConfig, backend: B, viewpoint: V) -> StreamingResult<Self> {
        let scheduler = ChunkScheduler::new(config, backend)?;
        Ok(Self::from_scheduler(scheduler, viewpoint))
    }

    /// Creates a streamer from explicit workers and terrain.
    ///
    /// # Errors
    ///
    /// Invalid configuration.
    pub fn with_parts(
        config: StreamingConfig,
        backend: B,
        viewpoint: V,
        workers: WorkerPool,
        field: Arc<dyn NoiseField>,
    ) -> StreamingResult<Self> {
        let scheduler = ChunkScheduler::with_parts(config, backend, workers, field)?;
        Ok(Self::from_scheduler(scheduler, viewpoint))
    }

    fn from_scheduler(scheduler: ChunkScheduler<B>, viewpoint: V) -> Self {
        let planner = LodRingPlanner::new(scheduler.config());
        Self {
            scheduler,
            planner,
            viewpoint,
            stats: StreamerStats::default(),
        }
    }

    /// Runs one frame: plan if due, then advance the scheduler.
    ///
    /// Returns `true` if a new plan was issued this frame.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let start = Instant::now();

        let planned = self.planner.update(dt, &self.viewpoint, &mut self.scheduler);
        self.scheduler.tick();

        let elapsed = start.elapsed();
        let elapsed_us = elapsed.as_micros() as u64;

        self.stats.frames += 1;
        self.stats.total_us += elapsed_us;
        self.stats.max_frame_us = self.stats.max_frame_us.max(elapsed_us);
        if planned {
            self.stats.plans += 1;
        }
        if elapsed > SLOW_TICK {
            self.stats.slow_frames += 1;
            tracing::debug!(frame = self.stats.frames, elapsed_us, planned, "slow streaming tick");
        }

        planned
    }

    /// True once everything requested is placed or dropped.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.planner.center().is_some() && self.scheduler.is_idle()
    }

    /// The viewpoint source.
    #[must_use]
    pub const fn viewpoint(&self) -> &V {
        &self.viewpoint
    }

    /// The viewpoint source, mutably.
    pub fn viewpoint_mut(&mut self) -> &mut V {
        &mut self.viewpoint
    }

    /// The scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &ChunkScheduler<B> {
        &self.scheduler
    }

    /// The scheduler, mutably.
    pub fn scheduler_mut(&mut self) -> &mut ChunkScheduler<B> {
        &mut self.scheduler
    }

    /// The planner.
    #[must_use]
    pub const fn planner(&self) -> &LodRingPlanner {
        &self.planner
    }

    /// The render backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        self.scheduler.backend()
    }

    /// Scheduler counters.
    #[must_use]
    pub const fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Frame timing.
    #[must_use]
    pub const fn stats(&self) -> StreamerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::ChunkCoord;
    use horizon_procedural::ConstantField;
    use horizon_streaming::RecordingBackend;

    fn streamer(viewpoint: [f32; 3]) -> TerrainStreamer<RecordingBackend, [f32; 3]> {
        let config = StreamingConfig {
            max_lod: 1,
            ..StreamingConfig::default()
        };
        TerrainStreamer::with_parts(
            config,
            RecordingBackend::new(),
            viewpoint,
            WorkerPool::inline(),
            Arc::new(ConstantField(0.1)),
        )
        .unwrap()
    }

    #[test]
    fn test_first_tick_plans_and_places() {
        let mut streamer = streamer([-50.0, 0.0, 250.0]);
        assert!(!streamer.is_settled());

        assert!(streamer.tick(Duration::from_millis(16)));
        assert!(streamer.is_settled());
        assert_eq!(streamer.planner().center(), Some(ChunkCoord::new(-1, 2)));
        assert_eq!(streamer.scheduler_stats().placed, 17);
        assert_eq!(streamer.stats().plans, 1);
    }

    #[test]
    fn test_moving_viewpoint_replans_on_interval() {
        let mut streamer = streamer([0.0, 0.0, 0.0]);
        streamer.tick(Duration::ZERO);

        *streamer.viewpoint_mut() = [350.0, 0.0, 0.0];
        let frame = Duration::from_millis(250);
        let planned: Vec<bool> = (0..4).map(|_| streamer.tick(frame)).collect();

        assert_eq!(planned, [false, false, false, true]);
        assert_eq!(streamer.planner().center(), Some(ChunkCoord::new(3, 0)));
        assert_eq!(streamer.stats().frames, 5);
        assert_eq!(streamer.stats().plans, 2);
    }
}
