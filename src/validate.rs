//! Request validation
//!
//! Checks the shape of a `parse(string, [options], callback)` call and
//! decodes the options object into [`OptionFlags`]. Nothing is scheduled
//! unless this succeeds.

use crate::error::ConfigError;
use crate::host::Callback;
use crate::job::{Job, OptionFlags};
use serde_json::{Map, Value};
use std::fmt;

/// Option key for [`OptionFlags::REQUIRE_BLUEPRINT_NAME`]
pub const REQUIRE_BLUEPRINT_NAME_OPTION: &str = "requireBlueprintName";
/// Option key for [`OptionFlags::EXPORT_SOURCEMAP`]
pub const EXPORT_SOURCEMAP_OPTION: &str = "exportSourcemap";

/// One positional argument as the host passes it
pub enum HostArg {
    Value(Value),
    Function(Callback),
}

impl HostArg {
    pub fn text(text: impl Into<String>) -> Self {
        HostArg::Value(Value::String(text.into()))
    }

    pub fn value(value: Value) -> Self {
        HostArg::Value(value)
    }

    pub fn function(callback: impl FnOnce(Option<Value>, Value) + 'static) -> Self {
        HostArg::Function(Box::new(callback))
    }

    /// Argument list for `parse(text, [options], callback)`
    pub fn call(
        text: impl Into<String>,
        options: Option<Value>,
        callback: impl FnOnce(Option<Value>, Value) + 'static,
    ) -> Vec<HostArg> {
        let mut args = vec![HostArg::text(text)];
        if let Some(options) = options {
            args.push(HostArg::value(options));
        }
        args.push(HostArg::function(callback));
        args
    }

    fn is_string(&self) -> bool {
        matches!(self, HostArg::Value(Value::String(_)))
    }
}

impl fmt::Debug for HostArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            HostArg::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// A validated call
pub struct Request {
    pub job: Job,
    pub callback: Callback,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestValidator;

impl RequestValidator {
    pub fn new() -> Self {
        Self
    }

    /// Accepts `(text, callback)` or `(text, options, callback)`.
    pub fn validate(&self, mut args: Vec<HostArg>) -> Result<Request, ConfigError> {
        let arity = args.len();
        if arity != 2 && arity != 3 {
            return Err(ConfigError::WrongArity { got: arity });
        }
        if !args[0].is_string() {
            return Err(ConfigError::ExpectedString);
        }

        let callback = match args.pop() {
            Some(HostArg::Function(callback)) => callback,
            _ => return Err(ConfigError::ExpectedCallback),
        };

        let flags = if arity == 3 {
            match args.pop() {
                Some(HostArg::Value(Value::Object(options))) => decode_options(&options)?,
                _ => return Err(ConfigError::ExpectedObject),
            }
        } else {
            OptionFlags::NONE
        };

        let source = match args.pop() {
            Some(HostArg::Value(Value::String(source))) => source,
            _ => return Err(ConfigError::ExpectedString),
        };

        Ok(Request {
            job: Job::new(source, flags),
            callback,
        })
    }
}

/// Decode a parse options object
pub fn decode_options(options: &Map<String, Value>) -> Result<OptionFlags, ConfigError> {
    let mut flags = OptionFlags::NONE;
    for (key, value) in options {
        let flag = match key.as_str() {
            REQUIRE_BLUEPRINT_NAME_OPTION => OptionFlags::REQUIRE_BLUEPRINT_NAME,
            EXPORT_SOURCEMAP_OPTION => OptionFlags::EXPORT_SOURCEMAP,
            _ => return Err(ConfigError::UnknownOption(key.clone())),
        };
        match value {
            Value::Bool(true) => flags.insert(flag),
            Value::Bool(false) => {}
            _ => return Err(ConfigError::InvalidOptionValue(key.clone())),
        }
    }
    Ok(flags)
}
