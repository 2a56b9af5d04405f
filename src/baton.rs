//! The Baton: one request's unit of ownership transfer
//!
//! A Baton bundles the [`Job`], its eventual [`ParseOutcome`] and the
//! [`CallbackHandle`] that names the user callback. It is moved, never
//! shared: the callback thread builds it, the worker pool owns it while the
//! parser runs, and the callback thread takes it back for dispatch. Whoever
//! holds the value is the only context that can touch its fields.
//!
//! ```text
//! Created -> Queued -> Running -> Completed -> Dispatched -> Disposed
//! (caller)  (caller)  (worker)   (worker)     (callback)    (callback)
//! ```
//!
//! Dropping a Baton disposes it. The callback itself never leaves the
//! callback thread; only its handle travels with the Baton.

use crate::blueprint::Parser;
use crate::error::{panic_message, LifecycleError};
use crate::host::CallbackHandle;
use crate::job::Job;
use crate::outcome::ParseOutcome;
use crate::pool::WorkUnit;
use crate::stats::Instrumentation;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Unique Baton identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatonId(pub u64);

static BATON_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl BatonId {
    fn next() -> Self {
        BatonId(BATON_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BatonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a Baton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatonState {
    /// Built on the calling thread
    Created,
    /// Handed to the worker pool
    Queued,
    /// Parser executing on a worker
    Running,
    /// Outcome populated
    Completed,
    /// Pulled off the completion queue, callback being invoked
    Dispatched,
    /// Callback released, memory reclaimed
    Disposed,
}

impl BatonState {
    pub const COUNT: usize = 6;

    /// Every state in lifecycle order
    pub const ALL: [BatonState; BatonState::COUNT] = [
        BatonState::Created,
        BatonState::Queued,
        BatonState::Running,
        BatonState::Completed,
        BatonState::Dispatched,
        BatonState::Disposed,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// The only state this one may advance to
    pub fn successor(self) -> Option<BatonState> {
        BatonState::ALL.get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self == BatonState::Disposed
    }
}

/// Ownership-transfer unit for one accepted request
pub struct Baton {
    id: BatonId,
    job: Job,
    outcome: Option<ParseOutcome>,
    callback: Option<CallbackHandle>,
    state: BatonState,
    parser: Arc<dyn Parser>,
    instrumentation: Arc<Instrumentation>,
}

impl Baton {
    /// Build a Baton in the `Created` state
    pub(crate) fn new(
        job: Job,
        callback: CallbackHandle,
        parser: Arc<dyn Parser>,
        instrumentation: Arc<Instrumentation>,
    ) -> Self {
        let id = BatonId::next();
        instrumentation.record(id, BatonState::Created);
        Self {
            id,
            job,
            outcome: None,
            callback: Some(callback),
            state: BatonState::Created,
            parser,
            instrumentation,
        }
    }

    pub fn id(&self) -> BatonId {
        self.id
    }

    pub fn state(&self) -> BatonState {
        self.state
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn outcome(&self) -> Option<&ParseOutcome> {
        self.outcome.as_ref()
    }

    /// Move to the next lifecycle state.
    ///
    /// `Disposed` is reached only by dropping the Baton.
    pub(crate) fn advance(&mut self, next: BatonState) -> Result<(), LifecycleError> {
        if next.is_terminal() || self.state.successor() != Some(next) {
            return Err(LifecycleError {
                baton: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.instrumentation.record(self.id, next);
        Ok(())
    }

    fn advance_or_log(&mut self, next: BatonState) {
        if let Err(e) = self.advance(next) {
            error!(error = %e, "baton lifecycle violated");
        }
    }

    /// Replace whatever the worker produced with an internal error.
    ///
    /// Used when the worker unwound before the Baton reached `Completed`.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.outcome = Some(ParseOutcome::internal_error(message));
        if self.state == BatonState::Queued {
            self.advance_or_log(BatonState::Running);
        }
        if self.state == BatonState::Running {
            self.advance_or_log(BatonState::Completed);
        }
    }

    pub(crate) fn take_outcome(&mut self) -> ParseOutcome {
        self.outcome
            .take()
            .unwrap_or_else(|| ParseOutcome::internal_error("no result was produced"))
    }

    pub(crate) fn take_callback(&mut self) -> Option<CallbackHandle> {
        self.callback.take()
    }
}

impl WorkUnit for Baton {
    fn run(&mut self) {
        self.advance_or_log(BatonState::Running);

        let parser = Arc::clone(&self.parser);
        let job = &self.job;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(job))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(baton = %self.id, %message, "parser panicked");
                ParseOutcome::internal_error(format!("parser panicked: {}", message))
            }
        };
        debug!(
            baton = %self.id,
            ok = outcome.report.is_ok(),
            warnings = outcome.report.warnings.len(),
            "parse finished"
        );

        self.outcome = Some(outcome);
        self.advance_or_log(BatonState::Completed);
    }
}

impl Drop for Baton {
    fn drop(&mut self) {
        if self.callback.is_some() {
            warn!(baton = %self.id, state = ?self.state, "baton disposed before dispatch");
        }
        self.state = BatonState::Disposed;
        self.instrumentation.record(self.id, BatonState::Disposed);
    }
}

impl fmt::Debug for Baton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Baton")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("bytes", &self.job.len())
            .field("flags", &self.job.flags())
            .field("has_outcome", &self.outcome.is_some())
            .finish()
    }
}
