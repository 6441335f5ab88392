//! # Background Work
//!
//! Chunk generation runs off the tick thread. The scheduler hands closures
//! to a [`WorkerPool`] and gets a [`TaskHandle`] back, which it polls once
//! per tick. Nothing on the tick thread ever blocks on a worker.
//!
//! ```text
//! ┌──────────────┐   spawn(job)   ┌──────────────────┐
//! │  Scheduler   │ ─────────────► │  crossbeam queue │
//! │ (tick thread)│                └────────┬─────────┘
//! │              │                         │
//! │   poll() ◄───┼──── bounded(1) ◄── horizon-worker-N
//! └──────────────┘
//! ```
//!
//! A [`CancellationToken`] rides along with every job. Workers check it at
//! coarse intervals and bail out early; the scheduler also discards any
//! result that arrives after its token was cancelled.

mod handle;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use handle::{TaskHandle, TaskPoll};
pub use worker::WorkerPool;

/// Shared flag telling a background job its result is no longer wanted.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once `cancel` has been called on any clone.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
