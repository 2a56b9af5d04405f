//! Worker threads
//!
//! Each worker pulls type-erased tasks off the shared work queue until the
//! queue is closed and drained.

use crossbeam_channel::Receiver;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Type-erased unit of work plus its completion hand-off
pub(crate) type Task = Box<dyn FnOnce() + Send>;

/// A spawned worker thread
pub(crate) struct Worker {
    pub index: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(index: usize, name: &str, queue: Receiver<Task>) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("{}-{}", name, index))
            .spawn(move || run(index, queue))?;
        Ok(Self {
            index,
            handle: Some(handle),
        })
    }

    /// Wait for the thread to exit; the work queue must already be closed.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!(worker = self.index, "worker thread exited by panic");
            }
        }
    }
}

fn run(index: usize, queue: Receiver<Task>) {
    debug!(worker = index, "worker started");
    while let Ok(task) = queue.recv() {
        trace!(worker = index, "task picked up");
        task();
    }
    debug!(worker = index, "worker stopped");
}
