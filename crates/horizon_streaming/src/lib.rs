//! # HORIZON Streaming
//!
//! Keeps the terrain around a moving viewpoint generated and on screen.
//!
//! ## Data Flow
//!
//! ```text
//! ViewpointSource ──► LodRingPlanner ──(batch)──► ChunkScheduler
//!                      every interval              │  generation queue
//!                      if chunk changed            │  pipelines (workers)
//!                                                  │  placement tickets
//!                                                  ▼
//!                                            RenderBackend
//!                                  (pooled slots, set once at startup)
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **One tick thread** - planner and scheduler run on the caller's
//!    thread; only heightmap, mesh and collision work runs on workers
//! 2. **Batches never interleave** - a new batch waits until every
//!    placement of the previous one has resolved
//! 3. **Failures degrade** - exhaustion, stale results and lost jobs are
//!    logged and counted, never returned from `tick`
//!
//! ## Example
//!
//! ```rust,ignore
//! use horizon_streaming::{ChunkScheduler, LodRingPlanner, RecordingBackend, StreamingConfig};
//!
//! let config = StreamingConfig::load("horizon.toml")?;
//! let mut scheduler = ChunkScheduler::new(config, RecordingBackend::new())?;
//! let mut planner = LodRingPlanner::new(scheduler.config());
//!
//! loop {
//!     planner.update(frame_time, &camera, &mut scheduler);
//!     scheduler.tick();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod config;
pub mod error;
pub mod planner;
pub mod scheduler;

pub use backend::{BackendCall, RecordedSlot, RecordingBackend, RenderBackend, SharedViewpoint, ViewpointSource};
pub use config::{NoiseConfig, StreamingConfig, DEFAULT_SEED};
pub use error::{StreamingError, StreamingResult};
pub use planner::{diagonal_offset, plan, LodRing, LodRingPlanner};
pub use scheduler::{ChunkNode, ChunkRequest, ChunkScheduler, SchedulerStats};
