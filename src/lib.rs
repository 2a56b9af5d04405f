//! Baton - Offload Bridge for Blocking Parses
//!
//! Runs a blocking, CPU-bound parse on a worker pool and hands the result
//! back to a user callback on a single callback thread. Every accepted call
//! gets exactly one callback invocation, and the per-request state (the
//! "Baton") is always released afterwards, even when the callback panics.
//!
//! # Features
//!
//! - **Non-blocking submission**: `parse` validates and returns immediately
//! - **Exactly-once delivery**: success, parse errors and worker panics all
//!   reach the callback once
//! - **Thread confinement**: callbacks and host values never leave the
//!   callback thread; workers only see the owned [`Job`]
//! - **Guaranteed disposal**: a Baton is dropped on every completion path
//! - **Lifecycle instrumentation**: per-state counters and an optional
//!   [`LifecycleObserver`] for verifying transitions
//!
//! # Example
//!
//! ```rust
//! use baton::{EventLoop, WorkerPool};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(WorkerPool::with_workers(2).unwrap());
//! let mut event_loop = EventLoop::builder().pool(pool).build().unwrap();
//!
//! event_loop
//!     .parse_text("# Notes API\n## Notes [/notes]\n### List [GET]\n", None, |error, result| {
//!         assert!(error.is_none());
//!         assert_eq!(result["ast"]["name"], "Notes API");
//!     })
//!     .unwrap();
//!
//! assert_eq!(event_loop.run(), 1);
//! ```
//!
//! # Architecture
//!
//! ```text
//!   callback thread                         worker pool
//! ┌─────────────────┐                 ┌─────────────────────┐
//! │ EventLoop::parse│                 │  Worker 0..N        │
//! │  validate       │   work queue    │                     │
//! │  store callback ├────────────────▶│  Baton::run         │
//! │  Baton (Queued) │                 │   parse(Job)        │
//! └─────────────────┘                 │   (Running →        │
//!                                     │    Completed)       │
//! ┌─────────────────┐                 │                     │
//! │ EventLoop::run  │ completion queue│                     │
//! │  encode values  │◀────────────────┤                     │
//! │  invoke callback│                 └─────────────────────┘
//! │  drop Baton     │
//! └─────────────────┘
//! ```

#![warn(clippy::all)]

pub mod baton;
pub mod blueprint;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod job;
pub mod logging;
pub mod outcome;
pub mod pool;
pub mod stats;
pub mod validate;

// Re-export commonly used types
pub use baton::{Baton, BatonId, BatonState};
pub use blueprint::{Blueprint, BlueprintParser, Parser, SourceMap};
pub use bridge::{CompletionDispatcher, DispatchBridge};
pub use codec::{ValueCodec, AST_VERSION};
pub use config::{BatonConfig, ConfigFileError, LoggingConfig, PoolConfig};
pub use error::{CallbackFault, ConfigError, LifecycleError};
pub use host::{
    Callback, CallbackHandle, CallbackRegistry, EventLoop, EventLoopBuilder, FaultHandler,
    Propagate, Submitter,
};
pub use job::{Job, OptionFlags};
pub use outcome::{codes, Annotation, CharRange, ErrorCode, ParseOutcome, Report};
pub use pool::{PoolError, WorkUnit, WorkerPool};
pub use stats::{Instrumentation, LifecycleObserver, StatsSnapshot, Transition, TransitionLog};
pub use validate::{HostArg, Request, RequestValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
