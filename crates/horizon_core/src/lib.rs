//! # HORIZON Core
//!
//! Engine-agnostic building blocks for infinite terrain streaming:
//! - Chunk coordinates and LOD footprint math
//! - A sparse, unbounded chunk store with O(1) lookup
//! - A fixed-capacity pool of reusable render slots
//! - Background workers with pollable, cancellable tasks
//!
//! ## Architecture Rules
//!
//! 1. **No engine types** - render handles are a type parameter
//! 2. **Render objects are never created during streaming** - they come
//!    from the pool, sized once
//! 3. **The tick thread never blocks** - background results are polled
//!
//! ## Example
//!
//! ```rust,ignore
//! use horizon_core::{ChunkCoord, ChunkObjectPool, WorkerPool};
//!
//! let workers = WorkerPool::new(0)?;
//! let mut pool = ChunkObjectPool::with_capacity(41, |i| i);
//! let slot = pool.acquire(ChunkCoord::new(0, 0))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod coord;
pub mod error;
pub mod memory;
pub mod store;
pub mod task;

pub use coord::{size_of_chunk_at_lod, ChunkCoord, LodLevel, LodScale, DEFAULT_CHUNK_SIZE, MAX_LOD_LEVEL};
pub use error::{PoolError, PoolResult, TaskError, TaskResult};
pub use memory::{ChunkObjectPool, SlotId};
pub use store::{ChunkStore, Direction, NodeId};
pub use task::{CancellationToken, TaskHandle, TaskPoll, WorkerPool};
