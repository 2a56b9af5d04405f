//! Parse outcome
//!
//! The output bundle a worker populates for one Baton: a report with the
//! error (if any) and warnings, the parsed blueprint, and its source map.

use crate::blueprint::{Blueprint, SourceMap};
use serde::Serialize;

/// Annotation codes.
///
/// Errors and warnings share the numeric space of the blueprint parser family.
pub mod codes {
    pub const OK: u32 = 0;

    // Errors
    pub const APPLICATION_ERROR: u32 = 1;
    pub const BUSINESS_ERROR: u32 = 2;
    pub const SYMBOL_ERROR: u32 = 3;

    // Warnings
    pub const API_NAME_WARNING: u32 = 1;
    pub const DUPLICATE_WARNING: u32 = 2;
    pub const EMPTY_DEFINITION_WARNING: u32 = 6;
}

/// Overall status of a parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Ok,
    Error,
}

/// Byte range into the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharRange {
    #[serde(rename = "index")]
    pub location: usize,
    pub length: usize,
}

impl CharRange {
    pub fn new(location: usize, length: usize) -> Self {
        Self { location, length }
    }

    pub fn end(&self) -> usize {
        self.location + self.length
    }
}

/// An error or warning attached to a place in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub message: String,
    pub code: u32,
    pub location: Vec<CharRange>,
    /// 1-based line of the first range
    pub line: Option<usize>,
}

impl Annotation {
    pub fn new(message: impl Into<String>, code: u32) -> Self {
        Self {
            message: message.into(),
            code,
            location: Vec::new(),
            line: None,
        }
    }

    pub fn at(mut self, range: CharRange, line: usize) -> Self {
        self.location.push(range);
        self.line = Some(line);
        self
    }
}

/// Error and warnings produced by one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub error: Option<Annotation>,
    pub warnings: Vec<Annotation>,
}

impl Report {
    pub fn error_code(&self) -> ErrorCode {
        match self.error {
            Some(_) => ErrorCode::Error,
            None => ErrorCode::Ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code() == ErrorCode::Ok
    }
}

/// Computed output of one job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub report: Report,
    pub ast: Blueprint,
    pub source_map: SourceMap,
}

impl ParseOutcome {
    /// Outcome for a computation that never produced anything usable,
    /// e.g. because the parser itself panicked.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            report: Report {
                error: Some(Annotation::new(message, codes::APPLICATION_ERROR)),
                warnings: Vec::new(),
            },
            ..Self::default()
        }
    }
}
