//! Worker threads fed by a crossbeam queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use super::handle::TaskHandle;
use crate::error::{TaskError, TaskResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs closures off the calling thread.
///
/// Cheap to clone; clones share the same threads. Threads shut down once
/// the last clone is dropped and the queue has drained.
///
/// [`WorkerPool::inline`] runs every job synchronously inside `spawn`,
/// which makes scheduling fully deterministic for tests.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    /// `None` in inline mode.
    queue: Option<Sender<Job>>,
    /// Worker threads.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Jobs spawned but not yet finished.
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Starts `threads` workers. Zero picks one less than the number of
    /// available cores, with a floor of one.
    ///
    /// # Errors
    ///
    /// [`TaskError::Spawn`] if a thread could not be started.
    pub fn new(threads: usize) -> TaskResult<Self> {
        let threads = if threads == 0 {
            thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        } else {
            threads
        };

        let (queue, jobs) = unbounded::<Job>();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(threads);

        for index in 0..threads {
            let name = format!("horizon-worker-{index}");
            let jobs = jobs.clone();
            let in_flight = Arc::clone(&in_flight);

            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::worker_loop(&jobs, &in_flight))
                .map_err(|source| TaskError::Spawn { name, source })?;
            workers.push(worker);
        }

        tracing::debug!(threads, "worker pool started");

        Ok(Self {
            inner: Arc::new(PoolInner {
                queue: Some(queue),
                workers: Mutex::new(workers),
                in_flight,
            }),
        })
    }

    /// A pool that runs each job to completion inside `spawn`.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                queue: None,
                workers: Mutex::new(Vec::new()),
                in_flight: Arc::new(AtomicUsize::new(0)),
            }),
        }
    }

    /// True for a pool built with [`WorkerPool::inline`].
    #[inline]
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.inner.queue.is_none()
    }

    /// Number of worker threads (0 when inline).
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.inner.workers.lock().len()
    }

    /// Jobs spawned but not yet finished.
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Queues `job` and returns a handle to its result.
    pub fn spawn<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (result_tx, result_rx) = bounded(1);
        let wrapped: Job = Box::new(move || {
            // The handle may already be gone; that just detaches the job.
            let _ = result_tx.send(job());
        });

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);

        match &self.inner.queue {
            Some(queue) => {
                if let Err(rejected) = queue.send(wrapped) {
                    // Workers are gone. Dropping the job drops its sender,
                    // so the handle reports `Lost`.
                    drop(rejected);
                    self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                    tracing::error!("worker queue closed, job dropped");
                }
            }
            None => run_job(wrapped, &self.inner.in_flight),
        }

        TaskHandle::new(result_rx)
    }

    fn worker_loop(jobs: &Receiver<Job>, in_flight: &AtomicUsize) {
        while let Ok(job) = jobs.recv() {
            run_job(job, in_flight);
        }
    }
}

fn run_job(job: Job, in_flight: &AtomicUsize) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("background job panicked");
    }
    in_flight.fetch_sub(1, Ordering::AcqRel);
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // Closing the queue lets each worker exit after the backlog.
        drop(self.queue.take());

        let current = thread::current().id();
        for worker in self.workers.get_mut().drain(..) {
            // The last clone can be dropped by a job running on a worker.
            if worker.thread().id() == current {
                continue;
            }
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("inline", &self.is_inline())
            .field("threads", &self.thread_count())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPoll;
    use std::time::Duration;

    #[test]
    fn test_inline_runs_immediately() {
        let pool = WorkerPool::inline();
        let mut handle = pool.spawn(|| 2 + 2);

        assert_eq!(handle.poll(), TaskPoll::Ready(4));
        assert_eq!(pool.in_flight(), 0);
        assert_eq!(pool.thread_count(), 0);
    }

    #[test]
    fn test_threaded_completes() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.thread_count(), 2);

        let handles: Vec<_> = (0..16u64).map(|i| pool.spawn(move || i * i)).collect();
        let total: u64 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
        assert_eq!(total, (0..16u64).map(|i| i * i).sum());
    }

    #[test]
    fn test_worker_thread_names() {
        let pool = WorkerPool::new(1).unwrap();
        let name = pool
            .spawn(|| thread::current().name().map(str::to_owned))
            .wait()
            .flatten();
        assert_eq!(name.as_deref(), Some("horizon-worker-0"));
    }

    #[test]
    fn test_panicking_job_is_lost() {
        let pool = WorkerPool::new(1).unwrap();
        let mut handle = pool.spawn(|| -> u32 { panic!("boom") });

        let mut outcome = TaskPoll::Pending;
        for _ in 0..200 {
            outcome = handle.wait_timeout(Duration::from_millis(10));
            if !outcome.is_pending() {
                break;
            }
        }
        assert_eq!(outcome, TaskPoll::Lost);

        // The worker survived the panic.
        assert_eq!(pool.spawn(|| 1).wait(), Some(1));
    }

    #[test]
    fn test_nested_spawn_from_worker() {
        let pool = WorkerPool::new(2).unwrap();
        let inner_pool = pool.clone();
        let outer = pool.spawn(move || inner_pool.spawn(|| 10).wait());
        assert_eq!(outer.wait().flatten(), Some(10));
    }
}
