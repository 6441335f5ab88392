//! # Heightmap Generation
//!
//! Fills a 255×255 grid of height samples for one chunk at one LOD.
//!
//! ## Sample Placement
//!
//! ```text
//! local  = (index / 254) × chunk_size × lod_scale
//! world  = local + coord × chunk_size
//! sample = field(world / resolution_adjustment)
//! ```
//!
//! The last row and column land exactly on the next chunk's first row and
//! column, so neighbouring chunks at the same LOD share their edge.

use std::sync::Arc;

use horizon_core::{CancellationToken, ChunkCoord, LodScale, TaskHandle, TaskPoll, WorkerPool};

use crate::noise::NoiseField;

/// Samples per heightmap axis.
pub const HEIGHTMAP_RESOLUTION: usize = 255;

/// Default divisor applied to world positions before sampling.
pub const DEFAULT_RESOLUTION_ADJUSTMENT: f64 = 5000.0;

/// Height samples for one chunk, indexed `x × 255 + z`.
#[derive(Clone, Debug, PartialEq)]
pub struct Heightmap {
    samples: Box<[f32]>,
}

impl Heightmap {
    /// Builds a heightmap from raw samples.
    ///
    /// Returns `None` unless there are exactly 255 × 255 samples.
    #[must_use]
    pub fn from_samples(samples: Vec<f32>) -> Option<Self> {
        if samples.len() != HEIGHTMAP_RESOLUTION * HEIGHTMAP_RESOLUTION {
            return None;
        }
        Some(Self {
            samples: samples.into_boxed_slice(),
        })
    }

    /// A heightmap with every sample set to `height`.
    #[must_use]
    pub fn flat(height: f32) -> Self {
        Self {
            samples: vec![height; HEIGHTMAP_RESOLUTION * HEIGHTMAP_RESOLUTION].into_boxed_slice(),
        }
    }

    /// Sample at grid position `(x, z)`.
    ///
    /// # Panics
    ///
    /// Panics if either index is 255 or more.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, z: usize) -> f32 {
        assert!(x < HEIGHTMAP_RESOLUTION && z < HEIGHTMAP_RESOLUTION, "sample ({x}, {z}) out of range");
        self.samples[x * HEIGHTMAP_RESOLUTION + z]
    }

    /// All samples in `x × 255 + z` order.
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Smallest and largest sample.
    #[must_use]
    pub fn min_max(&self) -> (f32, f32) {
        self.samples
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }
}

/// Produces heightmaps from a noise field.
#[derive(Clone)]
pub struct HeightmapGenerator {
    field: Arc<dyn NoiseField>,
    chunk_size: f64,
    resolution_adjustment: f64,
}

impl HeightmapGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(field: Arc<dyn NoiseField>, chunk_size: f32, resolution_adjustment: f64) -> Self {
        Self {
            field,
            chunk_size: f64::from(chunk_size),
            resolution_adjustment,
        }
    }

    /// World sample position of grid cell `(x, z)` in chunk `coord`,
    /// before the resolution adjustment.
    #[must_use]
    pub fn world_sample_position(&self, coord: ChunkCoord, scale: LodScale, x: usize, z: usize) -> [f64; 2] {
        let last = (HEIGHTMAP_RESOLUTION - 1) as f64;
        let local_x = (x as f64 / last) * self.chunk_size * f64::from(scale.x);
        let local_z = (z as f64 / last) * self.chunk_size * f64::from(scale.y);
        [
            local_x + f64::from(coord.x) * self.chunk_size,
            local_z + f64::from(coord.y) * self.chunk_size,
        ]
    }

    /// Fills a heightmap on the calling thread.
    ///
    /// Checks `token` once per row; returns `None` if it was cancelled.
    #[must_use]
    pub fn fill(&self, coord: ChunkCoord, scale: LodScale, token: &CancellationToken) -> Option<Heightmap> {
        let mut samples = Vec::with_capacity(HEIGHTMAP_RESOLUTION * HEIGHTMAP_RESOLUTION);

        for x in 0..HEIGHTMAP_RESOLUTION {
            if token.is_cancelled() {
                return None;
            }
            for z in 0..HEIGHTMAP_RESOLUTION {
                let [wx, wz] = self.world_sample_position(coord, scale, x, z);
                samples.push(
                    self.field
                        .sample(wx / self.resolution_adjustment, wz / self.resolution_adjustment),
                );
            }
        }

        Some(Heightmap {
            samples: samples.into_boxed_slice(),
        })
    }

    /// Starts filling a heightmap on `workers`.
    #[must_use]
    pub fn generate(
        &self,
        workers: &WorkerPool,
        coord: ChunkCoord,
        scale: LodScale,
        token: CancellationToken,
    ) -> HeightmapJob {
        let generator = self.clone();
        let handle = workers.spawn(move || generator.fill(coord, scale, &token));

        HeightmapJob {
            state: JobState::Running(handle),
        }
    }
}

/// How a heightmap job ended.
#[derive(Clone, Debug)]
pub enum HeightmapOutcome {
    /// The heightmap is ready.
    Ready(Arc<Heightmap>),
    /// The job saw its token cancelled and stopped early.
    Cancelled,
    /// The worker died before reporting.
    Lost,
}

enum JobState {
    Running(TaskHandle<Option<Heightmap>>),
    Finished(HeightmapOutcome),
    Taken,
}

/// A heightmap being filled in the background.
///
/// As an iterator it yields `false` while the fill is running, `true`
/// once when it has finished, then ends. Poll it once per tick.
pub struct HeightmapJob {
    state: JobState,
}

impl HeightmapJob {
    /// True once the job has finished (whether or not the outcome was taken).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, JobState::Running(_))
    }

    /// Takes the outcome. `None` while running or after it was taken.
    pub fn take_outcome(&mut self) -> Option<HeightmapOutcome> {
        match std::mem::replace(&mut self.state, JobState::Taken) {
            JobState::Finished(outcome) => Some(outcome),
            other => {
                self.state = other;
                None
            }
        }
    }
}

impl Iterator for HeightmapJob {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let JobState::Running(handle) = &mut self.state else {
            return None;
        };

        let outcome = match handle.poll() {
            TaskPoll::Pending => return Some(false),
            TaskPoll::Ready(Some(heightmap)) => HeightmapOutcome::Ready(Arc::new(heightmap)),
            TaskPoll::Ready(None) => HeightmapOutcome::Cancelled,
            TaskPoll::Lost => HeightmapOutcome::Lost,
        };

        self.state = JobState::Finished(outcome);
        Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::{ConstantField, ErodedFractalField, WorldSeed};

    /// Height equals the x world coordinate.
    struct RampField;

    impl NoiseField for RampField {
        fn sample(&self, x: f64, _y: f64) -> f32 {
            x as f32
        }
    }

    fn generator(field: impl NoiseField + 'static) -> HeightmapGenerator {
        HeightmapGenerator::new(Arc::new(field), 100.0, 1.0)
    }

    #[test]
    fn test_constant_field_fills_grid() {
        let heightmap = generator(ConstantField(0.25))
            .fill(ChunkCoord::new(3, -2), LodScale::FINEST, &CancellationToken::new())
            .unwrap();

        assert_eq!(heightmap.samples().len(), 255 * 255);
        assert_eq!(heightmap.min_max(), (0.25, 0.25));
    }

    #[test]
    fn test_sample_positions_follow_lod() {
        let generator = generator(RampField);

        assert_eq!(generator.world_sample_position(ChunkCoord::new(2, 0), LodScale::FINEST, 0, 0), [200.0, 0.0]);
        assert_eq!(generator.world_sample_position(ChunkCoord::new(2, 0), LodScale::FINEST, 254, 0), [300.0, 0.0]);
        assert_eq!(generator.world_sample_position(ChunkCoord::new(0, 1), LodScale::uniform(3), 0, 254), [0.0, 400.0]);

        let heightmap = generator
            .fill(ChunkCoord::new(-1, 0), LodScale::uniform(9), &CancellationToken::new())
            .unwrap();
        assert_eq!(heightmap.get(0, 7), -100.0);
        assert_eq!(heightmap.get(254, 0), 800.0);
    }

    #[test]
    fn test_neighbouring_chunks_share_edge() {
        let generator = HeightmapGenerator::new(
            Arc::new(ErodedFractalField::new(WorldSeed::new(5))),
            100.0,
            DEFAULT_RESOLUTION_ADJUSTMENT,
        );
        let token = CancellationToken::new();

        let a = generator.fill(ChunkCoord::new(0, 0), LodScale::FINEST, &token).unwrap();
        let b = generator.fill(ChunkCoord::new(1, 0), LodScale::FINEST, &token).unwrap();

        for z in (0..255).step_by(17) {
            assert!((a.get(254, z) - b.get(0, z)).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cancelled_fill_returns_none() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(generator(ConstantField(1.0))
            .fill(ChunkCoord::ORIGIN, LodScale::FINEST, &token)
            .is_none());
    }

    #[test]
    fn test_job_signals_once() {
        let workers = WorkerPool::inline();
        let mut job = generator(ConstantField(0.5)).generate(
            &workers,
            ChunkCoord::ORIGIN,
            LodScale::FINEST,
            CancellationToken::new(),
        );

        assert_eq!(job.next(), Some(true));
        assert_eq!(job.next(), None);
        assert!(job.is_finished());

        match job.take_outcome() {
            Some(HeightmapOutcome::Ready(heightmap)) => assert_eq!(heightmap.get(10, 10), 0.5),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(job.take_outcome().is_none());
    }

    #[test]
    fn test_job_on_threads_eventually_done() {
        let workers = WorkerPool::new(1).unwrap();
        let job = generator(ConstantField(0.5)).generate(
            &workers,
            ChunkCoord::new(4, 4),
            LodScale::uniform(3),
            CancellationToken::new(),
        );

        let signals: Vec<bool> = job
            .inspect(|done| {
                if !done {
                    std::thread::yield_now();
                }
            })
            .collect();
        assert_eq!(signals.last(), Some(&true));
        assert!(signals[..signals.len() - 1].iter().all(|done| !done));
    }

    #[test]
    fn test_cancelled_job_reports_cancelled() {
        let workers = WorkerPool::inline();
        let token = CancellationToken::new();
        token.cancel();

        let mut job = generator(ConstantField(0.5)).generate(&workers, ChunkCoord::ORIGIN, LodScale::FINEST, token);
        assert_eq!(job.next(), Some(true));
        assert!(matches!(job.take_outcome(), Some(HeightmapOutcome::Cancelled)));
    }

    #[test]
    fn test_from_samples_checks_length() {
        assert!(Heightmap::from_samples(vec![0.0; 10]).is_none());
        assert!(Heightmap::from_samples(vec![0.0; 255 * 255]).is_some());
    }
}
