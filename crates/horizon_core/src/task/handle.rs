//! Pollable result of a background job.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Outcome of a single poll.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskPoll<T> {
    /// Still running.
    Pending,
    /// Finished with a value.
    Ready(T),
    /// The job will never report: it panicked, was dropped unrun, or its
    /// value was already taken.
    Lost,
}

impl<T> TaskPoll<T> {
    /// True for [`TaskPoll::Pending`].
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Receiving end of a job spawned on a [`super::WorkerPool`].
///
/// Dropping the handle detaches the job. It still runs; its value is
/// simply discarded.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(receiver: Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Checks for the result without blocking.
    ///
    /// Returns `Ready` at most once.
    pub fn poll(&mut self) -> TaskPoll<T> {
        match self.receiver.try_recv() {
            Ok(value) => TaskPoll::Ready(value),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }

    /// Blocks until the job finishes. `None` if it was lost.
    #[must_use]
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Blocks for at most `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> TaskPoll<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => TaskPoll::Ready(value),
            Err(RecvTimeoutError::Timeout) => TaskPoll::Pending,
            Err(RecvTimeoutError::Disconnected) => TaskPoll::Lost,
        }
    }
}
