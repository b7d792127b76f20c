//! Deterministic task scheduling for convolution batches.
//!
//! `WorkerPool` wraps a fixed-size thread pool and hands back one
//! `TaskHandle` per submitted task. Results are delivered through the
//! handles, so collecting them in submission order is just waiting on the
//! handles in submission order, however the workers interleave.
//!
//! A pool of zero workers is a real mode, not an error: tasks are deferred
//! and run serially on the calling thread when their handle is waited on.
//! The per-worker start callback still fires exactly once in that mode,
//! for the calling thread.

use std::sync::mpsc;

use crate::error::ConvoError;

/// A fixed pool of worker threads with a per-worker start callback.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Build a pool of `workers` threads, running `start_fn(worker_index)`
    /// once on each worker before it takes any task. With `workers == 0`
    /// no threads are spawned; `start_fn(0)` runs immediately on the
    /// calling thread and tasks execute at `wait()` time.
    pub fn new<F>(workers: usize, start_fn: F) -> Result<Self, ConvoError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        if workers == 0 {
            start_fn(0);
            return Ok(Self { pool: None });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .start_handler(move |index| start_fn(index))
            .build()
            .map_err(|err| ConvoError::Pool(err.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of worker threads; zero in deferred mode.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, |p| p.current_num_threads())
    }

    /// Queue a task. Returns immediately; the result is claimed through
    /// the handle.
    pub fn submit<R, F>(&self, task: F) -> TaskHandle<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        match &self.pool {
            Some(pool) => {
                let (tx, rx) = mpsc::channel();
                pool.spawn(move || {
                    // The receiver may have been dropped on cancellation;
                    // the result is simply discarded then.
                    let _ = tx.send(task());
                });
                TaskHandle::Pooled(rx)
            }
            None => TaskHandle::Deferred(Some(Box::new(task))),
        }
    }
}

/// Claim on the result of one submitted task.
pub enum TaskHandle<R> {
    Pooled(mpsc::Receiver<R>),
    Deferred(Option<Box<dyn FnOnce() -> R + Send>>),
}

impl<R> TaskHandle<R> {
    /// Block until the task has run and yield its result. In deferred mode
    /// this is where the task actually executes.
    pub fn wait(&mut self) -> Result<R, ConvoError> {
        match self {
            TaskHandle::Pooled(rx) => rx
                .recv()
                .map_err(|_| ConvoError::Batch("worker dropped its result".into())),
            TaskHandle::Deferred(task) => match task.take() {
                Some(task) => Ok(task()),
                None => Err(ConvoError::Batch("task result already claimed".into())),
            },
        }
    }
}

/// Run two independent closures as a fork/join pair.
pub fn join2<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    rayon::join(a, b)
}
