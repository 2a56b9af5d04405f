//! Completion side of the bridge
//!
//! Runs only on the callback thread. For each finished Baton it builds the
//! host values, invokes the user callback once and disposes the Baton. The
//! Baton is dropped on every path, including a panicking callback; the
//! fault is forwarded only after that.

use crate::baton::{Baton, BatonState};
use crate::codec::ValueCodec;
use crate::error::CallbackFault;
use crate::host::{CallbackRegistry, FaultHandler};
use crate::pool::Completed;
use crate::stats::Instrumentation;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct CompletionDispatcher {
    codec: ValueCodec,
    faults: Box<dyn FaultHandler>,
    instrumentation: Arc<Instrumentation>,
}

impl CompletionDispatcher {
    pub fn new(
        codec: ValueCodec,
        faults: Box<dyn FaultHandler>,
        instrumentation: Arc<Instrumentation>,
    ) -> Self {
        Self {
            codec,
            faults,
            instrumentation,
        }
    }

    /// Deliver one completed Baton to its callback
    pub fn dispatch(&mut self, registry: &mut CallbackRegistry, completed: Completed<Baton>) {
        let Completed {
            unit: mut baton,
            panic,
        } = completed;
        let id = baton.id();

        if let Some(message) = panic {
            warn!(baton = %id, %message, "worker unwound before completing");
            baton.fail(format!("worker panicked: {}", message));
        }
        if let Err(e) = baton.advance(BatonState::Dispatched) {
            error!(error = %e, "baton lifecycle violated");
        }

        let outcome = baton.take_outcome();
        let flags = baton.job().flags();
        let error = self.codec.encode_error(&outcome);
        let result = self.codec.encode_result(&outcome, flags);
        drop(outcome);

        let Some(callback) = baton
            .take_callback()
            .and_then(|handle| registry.redeem(handle))
        else {
            error!(baton = %id, "callback missing from registry");
            return;
        };

        debug!(baton = %id, failed = error.is_some(), "invoking callback");
        let invoked = panic::catch_unwind(AssertUnwindSafe(move || callback(error, result)));
        drop(baton);

        if let Err(payload) = invoked {
            self.instrumentation.record_fault();
            self.faults.on_fault(CallbackFault::new(id, payload));
        }
    }
}
