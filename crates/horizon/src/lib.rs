//! # HORIZON
//!
//! Infinite terrain streaming: concentric LOD rings around a moving
//! viewpoint, generated on workers and placed into a fixed pool of render
//! slots.
//!
//! ## Crates
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            HORIZON                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  horizon_streaming   planner, scheduler, backend traits, config  │
//! │          │                                                       │
//! │          ▼                                                       │
//! │  horizon_procedural  noise, heightmaps, meshes, collision        │
//! │          │                                                       │
//! │          ▼                                                       │
//! │  horizon_core        coordinates, chunk store, slot pool, workers│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use horizon::{RecordingBackend, SharedViewpoint, StreamingConfig, TerrainStreamer};
//!
//! let camera = SharedViewpoint::new([0.0, 0.0, 0.0]);
//! let mut streamer = TerrainStreamer::new(StreamingConfig::default(), RecordingBackend::new(), camera.clone())?;
//!
//! loop {
//!     camera.set(player_position);
//!     streamer.tick(frame_time);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod streamer;

// Re-export the layers
pub use horizon_core as core;
pub use horizon_procedural as procedural;
pub use horizon_streaming as streaming;

// Re-export commonly used types
pub use horizon_core::{ChunkCoord, LodLevel, WorkerPool};
pub use horizon_streaming::{
    ChunkRequest, ChunkScheduler, LodRingPlanner, RecordingBackend, RenderBackend, SchedulerStats, SharedViewpoint,
    StreamingConfig, StreamingError, StreamingResult, ViewpointSource,
};
pub use streamer::{StreamerStats, TerrainStreamer, SLOW_TICK};
