//! Deferred submission from inside callbacks
//!
//! A callback runs while the loop is mid-dispatch, so it cannot borrow the
//! [`EventLoop`](super::EventLoop). A [`Submitter`] validates the call on the
//! spot and parks the request; the loop schedules parked requests before it
//! waits for the next completion.

use crate::error::ConfigError;
use crate::validate::{HostArg, Request, RequestValidator};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub(crate) type Deferred = Rc<RefCell<VecDeque<Request>>>;

/// Cloneable handle for submitting parses to one event loop
#[derive(Clone)]
pub struct Submitter {
    validator: RequestValidator,
    deferred: Deferred,
}

impl Submitter {
    pub(crate) fn new(validator: RequestValidator, deferred: Deferred) -> Self {
        Self {
            validator,
            deferred,
        }
    }

    /// Same contract as [`EventLoop::parse`](super::EventLoop::parse).
    ///
    /// The request is scheduled the next time the loop runs.
    pub fn parse(&self, args: Vec<HostArg>) -> Result<(), ConfigError> {
        let request = self.validator.validate(args)?;
        self.deferred.borrow_mut().push_back(request);
        Ok(())
    }

    pub fn parse_text(
        &self,
        text: impl Into<String>,
        options: Option<Value>,
        callback: impl FnOnce(Option<Value>, Value) + 'static,
    ) -> Result<(), ConfigError> {
        self.parse(HostArg::call(text, options, callback))
    }

    /// Requests waiting to be scheduled
    pub fn parked(&self) -> usize {
        self.deferred.borrow().len()
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("parked", &self.parked())
            .finish()
    }
}
