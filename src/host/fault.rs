//! Callback fault handling
//!
//! A panicking user callback is not the dispatcher's to recover from. The
//! Baton is disposed first, then the fault goes to the loop's
//! [`FaultHandler`]. The default, [`Propagate`], resumes the unwind so it
//! surfaces from `EventLoop::run` at the host's top level.

use crate::error::CallbackFault;
use std::panic;
use tracing::error;

/// Top-level handler for callback faults, called on the callback thread
pub trait FaultHandler {
    fn on_fault(&mut self, fault: CallbackFault);
}

impl<F> FaultHandler for F
where
    F: FnMut(CallbackFault),
{
    fn on_fault(&mut self, fault: CallbackFault) {
        self(fault)
    }
}

/// Log the fault and resume unwinding with the original payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Propagate;

impl FaultHandler for Propagate {
    fn on_fault(&mut self, fault: CallbackFault) {
        error!(baton = %fault.baton(), message = fault.message(), "callback panicked");
        panic::resume_unwind(fault.into_payload());
    }
}
