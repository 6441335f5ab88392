//! # Core Error Types
//!
//! Neither error here is fatal: callers log them and skip the chunk for
//! this cycle.

use thiserror::Error;

use crate::coord::ChunkCoord;

/// Errors raised by the render slot pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Every slot is occupied.
    #[error("chunk object requested from empty pool (capacity {capacity})")]
    Exhausted {
        /// Total slot count.
        capacity: usize,
    },

    /// No occupied slot is assigned to the coordinate being released.
    #[error("no pooled chunk object holds {coord}")]
    StaleMatch {
        /// The coordinate that was released.
        coord: ChunkCoord,
    },
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by the worker pool.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread {name}: {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for worker pool setup.
pub type TaskResult<T> = Result<T, TaskError>;
