//! Submission side of the bridge
//!
//! Runs on the callback thread and never blocks: it either schedules one
//! Baton or reports a [`ConfigError`] without side effects.

use crate::baton::{Baton, BatonId, BatonState};
use crate::blueprint::Parser;
use crate::error::ConfigError;
use crate::host::CallbackRegistry;
use crate::pool::{CompletionSender, WorkerPool};
use crate::stats::Instrumentation;
use crate::validate::{HostArg, Request, RequestValidator};
use std::sync::Arc;
use tracing::{debug, error};

pub struct DispatchBridge {
    validator: RequestValidator,
    parser: Arc<dyn Parser>,
    pool: Arc<WorkerPool>,
    completions: CompletionSender<Baton>,
    instrumentation: Arc<Instrumentation>,
}

impl DispatchBridge {
    pub fn new(
        validator: RequestValidator,
        parser: Arc<dyn Parser>,
        pool: Arc<WorkerPool>,
        completions: CompletionSender<Baton>,
        instrumentation: Arc<Instrumentation>,
    ) -> Self {
        Self {
            validator,
            parser,
            pool,
            completions,
            instrumentation,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Validate the call, wrap it in a Baton and hand it to the pool.
    ///
    /// On error nothing is stored and nothing is scheduled.
    pub fn submit(
        &self,
        registry: &mut CallbackRegistry,
        args: Vec<HostArg>,
    ) -> Result<BatonId, ConfigError> {
        let request = self.validator.validate(args).map_err(|e| {
            debug!(error = %e, "parse call rejected");
            e
        })?;
        Ok(self.schedule(registry, request))
    }

    /// Schedule a request that already passed validation
    pub fn schedule(&self, registry: &mut CallbackRegistry, request: Request) -> BatonId {
        let Request { job, callback } = request;
        let handle = registry.store(callback);
        let mut baton = Baton::new(
            job,
            handle,
            Arc::clone(&self.parser),
            Arc::clone(&self.instrumentation),
        );
        let id = baton.id();

        if let Err(e) = baton.advance(BatonState::Queued) {
            error!(error = %e, "baton lifecycle violated");
        }
        debug!(
            baton = %id,
            bytes = baton.job().len(),
            flags = %baton.job().flags(),
            "scheduling parse"
        );
        self.pool.schedule(baton, &self.completions);
        id
    }
}
