//! Callback-thread host
//!
//! [`EventLoop`] plays the role of the single logical thread user callbacks
//! run on. It owns the callback registry and the receiving end of the
//! completion queue, so it is `!Send`: everything a callback sees happens on
//! the thread that created the loop.
//!
//! Callbacks that want to submit follow-up parses use a [`Submitter`]
//! obtained from [`EventLoop::submitter`]. Dropping a loop with accepted work
//! outstanding keeps it running until every callback has been invoked.
//!
//! # Usage
//!
//! ```no_run
//! use baton::EventLoop;
//!
//! let mut event_loop = EventLoop::new()?;
//! event_loop.parse_text("# Notes API\n", None, |error, result| {
//!     assert!(error.is_none());
//!     println!("{}", result["ast"]["name"]);
//! })?;
//! event_loop.run();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod fault;
mod registry;
mod submitter;

pub use fault::{FaultHandler, Propagate};
pub use registry::{Callback, CallbackHandle, CallbackId, CallbackRegistry};
pub use submitter::Submitter;

use crate::baton::{Baton, BatonId};
use crate::blueprint::{BlueprintParser, Parser};
use crate::bridge::{CompletionDispatcher, DispatchBridge};
use crate::codec::ValueCodec;
use crate::error::ConfigError;
use crate::pool::{completion_queue, Completed, CompletionReceiver, PoolError, WorkerPool};
use crate::stats::{Instrumentation, LifecycleObserver, StatsSnapshot};
use crate::validate::{HostArg, RequestValidator};
use serde_json::Value;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use submitter::Deferred;
use tracing::{debug, trace, warn};

/// Single-threaded host for parse callbacks
pub struct EventLoop {
    bridge: DispatchBridge,
    dispatcher: CompletionDispatcher,
    registry: CallbackRegistry,
    completions: CompletionReceiver<Baton>,
    instrumentation: Arc<Instrumentation>,
    /// Requests accepted through a [`Submitter`], not yet scheduled
    deferred: Deferred,
    /// Scheduled requests not yet dispatched
    pending: usize,
}

impl EventLoop {
    /// Loop on the shared worker pool with the blueprint parser
    pub fn new() -> Result<Self, PoolError> {
        Self::builder().build()
    }

    pub fn builder() -> EventLoopBuilder {
        EventLoopBuilder::default()
    }

    /// Submit `args` as `parse(string, [options], callback)`.
    ///
    /// Returns immediately. A malformed call is rejected here and its
    /// callback is never invoked.
    pub fn parse(&mut self, args: Vec<HostArg>) -> Result<BatonId, ConfigError> {
        let id = self.bridge.submit(&mut self.registry, args)?;
        self.pending += 1;
        Ok(id)
    }

    /// Typed form of [`parse`](Self::parse)
    pub fn parse_text(
        &mut self,
        text: impl Into<String>,
        options: Option<Value>,
        callback: impl FnOnce(Option<Value>, Value) + 'static,
    ) -> Result<BatonId, ConfigError> {
        self.parse(HostArg::call(text, options, callback))
    }

    /// Handle for submitting from inside callbacks
    pub fn submitter(&self) -> Submitter {
        Submitter::new(RequestValidator::new(), Rc::clone(&self.deferred))
    }

    /// Requests accepted but not yet delivered
    pub fn pending(&self) -> usize {
        self.pending + self.deferred.borrow().len()
    }

    fn schedule_deferred(&mut self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some(request) = next else {
                break;
            };
            self.bridge.schedule(&mut self.registry, request);
            self.pending += 1;
        }
    }

    /// Dispatch completions until nothing is pending.
    ///
    /// Returns the number of callbacks invoked.
    pub fn run(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            self.schedule_deferred();
            if self.pending == 0 {
                break;
            }
            match self.completions.recv() {
                Ok(completed) => {
                    self.dispatch(completed);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        dispatched
    }

    /// Like [`run`](Self::run) but stop waiting after `timeout`.
    ///
    /// Work still in flight keeps running; a later call picks it up.
    pub fn run_timeout(&mut self, timeout: Duration) -> usize {
        let start = Instant::now();
        let mut dispatched = 0;
        loop {
            self.schedule_deferred();
            if self.pending == 0 {
                break;
            }
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            match self.completions.recv_timeout(remaining) {
                Ok(completed) => {
                    self.dispatch(completed);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        dispatched
    }

    /// Dispatch whatever has already completed without blocking
    pub fn poll(&mut self) -> usize {
        let mut dispatched = 0;
        loop {
            self.schedule_deferred();
            if self.pending == 0 {
                break;
            }
            match self.completions.try_recv() {
                Ok(completed) => {
                    self.dispatch(completed);
                    dispatched += 1;
                }
                Err(_) => break,
            }
        }
        dispatched
    }

    fn dispatch(&mut self, completed: Completed<Baton>) {
        trace!(baton = %completed.unit.id(), "completion dequeued");
        // Counted before the callback runs so a propagated fault leaves the
        // loop consistent.
        self.pending -= 1;
        self.dispatcher.dispatch(&mut self.registry, completed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.instrumentation.snapshot()
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        self.bridge.pool()
    }

    /// Callbacks stored and not yet invoked
    pub fn stored_callbacks(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if self.pending() == 0 {
            return;
        }
        if !thread::panicking() {
            debug!(pending = self.pending(), "draining event loop before drop");
            self.run();
            return;
        }

        // Already unwinding: invoke nothing, release what came back.
        let parked = std::mem::take(&mut *self.deferred.borrow_mut());
        drop(parked);
        while let Ok(Completed { unit: mut baton, .. }) = self.completions.try_recv() {
            if let Some(handle) = baton.take_callback() {
                self.registry.release(handle);
            }
            self.pending -= 1;
        }
        warn!(abandoned = self.pending, "event loop dropped while unwinding");
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .field("registry", &self.registry)
            .field("stats", &self.instrumentation.snapshot())
            .finish()
    }
}

/// Configures an [`EventLoop`]
#[derive(Default)]
pub struct EventLoopBuilder {
    pool: Option<Arc<WorkerPool>>,
    parser: Option<Arc<dyn Parser>>,
    faults: Option<Box<dyn FaultHandler>>,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl EventLoopBuilder {
    /// Use a dedicated pool instead of [`WorkerPool::shared`]
    pub fn pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Replace the default [`Propagate`] policy
    pub fn fault_handler(mut self, handler: impl FaultHandler + 'static) -> Self {
        self.faults = Some(Box::new(handler));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<EventLoop, PoolError> {
        let pool = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::shared()?,
        };
        let parser = self
            .parser
            .unwrap_or_else(|| Arc::new(BlueprintParser::new()));
        let faults = self.faults.unwrap_or_else(|| Box::new(Propagate));
        let instrumentation = Arc::new(match self.observer {
            Some(observer) => Instrumentation::with_observer(observer),
            None => Instrumentation::new(),
        });

        let (sender, receiver) = completion_queue();
        Ok(EventLoop {
            bridge: DispatchBridge::new(
                RequestValidator::new(),
                parser,
                pool,
                sender,
                Arc::clone(&instrumentation),
            ),
            dispatcher: CompletionDispatcher::new(
                ValueCodec::new(),
                faults,
                Arc::clone(&instrumentation),
            ),
            registry: CallbackRegistry::new(),
            completions: receiver,
            instrumentation,
            deferred: Deferred::default(),
            pending: 0,
        })
    }
}
