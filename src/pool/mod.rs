//! Worker pool with a completion queue
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  schedule   ┌────────────┐   run()   ┌──────────────┐
//! │ callback     │ ──────────► │ work queue │ ────────► │ worker 0..N  │
//! │ thread       │             └────────────┘           └──────┬───────┘
//! │ (EventLoop)  │ ◄───────────────────────────────────────────┘
//! └──────────────┘        completion queue (Completed<U>)
//! ```
//!
//! The work queue is shared by all workers; every caller brings its own
//! completion queue, so finished units go back to the loop that scheduled
//! them. `run` is invoked exactly once per scheduled unit and the completion
//! is always sent afterwards, even when `run` panicked. Units may finish in
//! any order.

mod worker;

use crate::config::PoolConfig;
use crate::error::panic_message;
use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use once_cell::sync::OnceCell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use worker::{Task, Worker};

/// Upper bound on worker threads
pub const MAX_WORKERS: usize = 1024;

/// Worker count when nothing else is configured
pub const DEFAULT_WORKERS: usize = 4;

/// Work executed on a pool thread
pub trait WorkUnit: Send + 'static {
    fn run(&mut self);
}

/// A unit whose `run` has returned (or unwound)
#[derive(Debug)]
pub struct Completed<U> {
    pub unit: U,
    /// Panic message if `run` unwound
    pub panic: Option<String>,
}

pub type CompletionSender<U> = Sender<Completed<U>>;
pub type CompletionReceiver<U> = Receiver<Completed<U>>;

/// Create the completion queue drained by one callback thread
pub fn completion_queue<U>() -> (CompletionSender<U>, CompletionReceiver<U>) {
    unbounded()
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be between 1 and 1024, got {0}")]
    InvalidSize(usize),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Pool counters
#[derive(Debug, Default)]
pub struct PoolStats {
    scheduled: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolStats {
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Acquire)
    }

    /// Scheduled units that have not finished running
    pub fn in_flight(&self) -> u64 {
        self.scheduled().saturating_sub(self.completed())
    }
}

/// Bounded set of worker threads fed by one unbounded work queue
pub struct WorkerPool {
    queue: Option<Sender<Task>>,
    workers: Vec<Worker>,
    stats: Arc<PoolStats>,
}

static SHARED_POOL: OnceCell<Arc<WorkerPool>> = OnceCell::new();

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        if config.workers == 0 || config.workers > MAX_WORKERS {
            return Err(PoolError::InvalidSize(config.workers));
        }

        let (sender, receiver) = unbounded::<Task>();
        let workers = (0..config.workers)
            .map(|index| Worker::spawn(index, &config.thread_name, receiver.clone()))
            .collect::<io::Result<Vec<_>>>()?;

        info!(workers = workers.len(), "worker pool started");
        Ok(Self {
            queue: Some(sender),
            workers,
            stats: Arc::new(PoolStats::default()),
        })
    }

    /// Pool with `workers` threads and default naming
    pub fn with_workers(workers: usize) -> Result<Self, PoolError> {
        Self::new(&PoolConfig {
            workers,
            ..PoolConfig::default()
        })
    }

    /// Process-wide pool, sized from `BATON_THREADPOOL_SIZE` on first use
    pub fn shared() -> Result<Arc<WorkerPool>, PoolError> {
        SHARED_POOL
            .get_or_try_init(|| WorkerPool::new(&PoolConfig::from_env()).map(Arc::new))
            .cloned()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Queue `unit` for execution and return immediately.
    ///
    /// After `unit.run()` returns on a worker, the unit is sent on
    /// `completions` together with the panic message if it unwound.
    pub fn schedule<U: WorkUnit>(&self, unit: U, completions: &CompletionSender<U>) {
        let completions = completions.clone();
        let stats = Arc::clone(&self.stats);
        let task: Task = Box::new(move || {
            let mut unit = unit;
            let panic = panic::catch_unwind(AssertUnwindSafe(|| unit.run()))
                .err()
                .map(|payload| panic_message(payload.as_ref()));
            if let Some(message) = &panic {
                stats.panicked.fetch_add(1, Ordering::AcqRel);
                warn!(%message, "work unit panicked");
            }
            stats.completed.fetch_add(1, Ordering::AcqRel);

            if completions.send(Completed { unit, panic }).is_err() {
                warn!("completion queue closed, dropping finished unit");
            }
        });

        self.stats.scheduled.fetch_add(1, Ordering::AcqRel);
        let rejected = match &self.queue {
            Some(queue) => queue.send(task).err().map(|SendError(task)| task),
            None => Some(task),
        };
        // Only reachable if every worker is gone; run inline so the unit
        // still completes exactly once.
        if let Some(task) = rejected {
            warn!("work queue unavailable, running unit on the calling thread");
            task();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets workers drain what is left and exit.
        self.queue.take();
        for worker in &mut self.workers {
            worker.join();
        }
        debug!(
            scheduled = self.stats.scheduled(),
            completed = self.stats.completed(),
            "worker pool stopped"
        );
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.workers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    struct Square {
        input: u64,
        output: Option<u64>,
        ran_on: Option<ThreadId>,
    }

    impl WorkUnit for Square {
        fn run(&mut self) {
            self.output = Some(self.input * self.input);
            self.ran_on = Some(thread::current().id());
        }
    }

    struct Explode;

    impl WorkUnit for Explode {
        fn run(&mut self) {
            panic!("unit exploded");
        }
    }

    #[test]
    fn test_rejects_bad_size() {
        assert!(matches!(
            WorkerPool::with_workers(0),
            Err(PoolError::InvalidSize(0))
        ));
        assert!(matches!(
            WorkerPool::with_workers(MAX_WORKERS + 1),
            Err(PoolError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_runs_off_calling_thread() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let (tx, rx) = completion_queue();

        pool.schedule(
            Square {
                input: 7,
                output: None,
                ran_on: None,
            },
            &tx,
        );

        let done = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(done.panic.is_none());
        assert_eq!(done.unit.output, Some(49));
        assert_ne!(done.unit.ran_on, Some(thread::current().id()));
    }

    #[test]
    fn test_every_unit_completes_once() {
        let pool = WorkerPool::with_workers(4).unwrap();
        let (tx, rx) = completion_queue();

        for input in 0..200 {
            pool.schedule(
                Square {
                    input,
                    output: None,
                    ran_on: None,
                },
                &tx,
            );
        }

        let mut seen = HashSet::new();
        for _ in 0..200 {
            let done = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(done.unit.output, Some(done.unit.input * done.unit.input));
            assert!(seen.insert(done.unit.input));
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(pool.stats().completed(), 200);
        assert_eq!(pool.stats().in_flight(), 0);
    }

    #[test]
    fn test_panicking_unit_still_completes() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let (tx, rx) = completion_queue();

        pool.schedule(Explode, &tx);
        let done = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(done.panic.as_deref(), Some("unit exploded"));
        assert_eq!(pool.stats().panicked(), 1);

        // The worker survived and keeps serving.
        let (tx, rx) = completion_queue();
        pool.schedule(
            Square {
                input: 3,
                output: None,
                ran_on: None,
            },
            &tx,
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().unit.output,
            Some(9)
        );
    }

    #[test]
    fn test_drop_drains_queue() {
        let (tx, rx) = completion_queue();
        {
            let pool = WorkerPool::with_workers(1).unwrap();
            for input in 0..10 {
                pool.schedule(
                    Square {
                        input,
                        output: None,
                        ran_on: None,
                    },
                    &tx,
                );
            }
        }
        assert_eq!(rx.try_iter().count(), 10);
    }

    #[test]
    fn test_shared_pool_is_singleton() {
        let a = WorkerPool::shared().unwrap();
        let b = WorkerPool::shared().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.size() >= 1);
    }
}
