//! Error types for the dispatch bridge
//!
//! - [`ConfigError`]: malformed call, reported synchronously by `parse`
//! - [`CallbackFault`]: the user callback panicked on the callback thread
//! - [`LifecycleError`]: a Baton transition out of order (internal bug)
//!
//! Problems with the parsed input itself are not errors here; they travel
//! as data inside [`Report`](crate::Report).

use crate::baton::{BatonId, BatonState};
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Malformed `parse(string, [options], callback)` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("wrong number of arguments, `parse(string, options, callback)` expected")]
    WrongArity { got: usize },

    #[error("wrong argument - string expected, `parse(string, options, callback)`")]
    ExpectedString,

    #[error("wrong argument - callback expected, `parse(string, options, callback)`")]
    ExpectedCallback,

    #[error("wrong argument - object expected, `parse(string, options, callback)`")]
    ExpectedObject,

    #[error("unrecognized option '{0}', expected: 'requireBlueprintName' or 'exportSourcemap'")]
    UnknownOption(String),

    #[error("wrong option value - boolean expected for '{0}'")]
    InvalidOptionValue(String),
}

/// Out-of-order Baton state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("baton {baton}: illegal transition {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub baton: BatonId,
    pub from: BatonState,
    pub to: BatonState,
}

/// A panic raised by a user callback.
///
/// Carries the original panic payload so a fault handler can resume the
/// unwind unchanged.
pub struct CallbackFault {
    baton: BatonId,
    message: String,
    payload: Box<dyn Any + Send>,
}

impl CallbackFault {
    pub fn new(baton: BatonId, payload: Box<dyn Any + Send>) -> Self {
        Self {
            baton,
            message: panic_message(payload.as_ref()),
            payload,
        }
    }

    pub fn baton(&self) -> BatonId {
        self.baton
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_payload(self) -> Box<dyn Any + Send> {
        self.payload
    }
}

impl fmt::Debug for CallbackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackFault")
            .field("baton", &self.baton)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CallbackFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback for baton {} panicked: {}", self.baton, self.message)
    }
}

impl std::error::Error for CallbackFault {}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
