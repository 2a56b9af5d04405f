//! Host value encoding
//!
//! Turns a [`ParseOutcome`] into the two values a callback receives:
//! an error annotation (absent on success) and the result object, which is
//! always present and carries partial data when the parse failed.

use crate::job::OptionFlags;
use crate::outcome::{Annotation, ParseOutcome};
use serde_json::{json, Map, Value};

/// Version tag of the result object
pub const AST_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec;

impl ValueCodec {
    pub fn new() -> Self {
        Self
    }

    /// `None` when the parse succeeded
    pub fn encode_error(&self, outcome: &ParseOutcome) -> Option<Value> {
        outcome.report.error.as_ref().map(encode_annotation)
    }

    /// `{"_version", "ast", "warnings"}` plus `"sourcemap"` when requested
    pub fn encode_result(&self, outcome: &ParseOutcome, flags: OptionFlags) -> Value {
        let mut result = Map::new();
        result.insert("_version".into(), Value::from(AST_VERSION));
        result.insert("ast".into(), json!(outcome.ast));
        result.insert(
            "warnings".into(),
            Value::Array(
                outcome
                    .report
                    .warnings
                    .iter()
                    .map(encode_annotation)
                    .collect(),
            ),
        );
        if flags.contains(OptionFlags::EXPORT_SOURCEMAP) {
            result.insert("sourcemap".into(), json!(outcome.source_map));
        }
        Value::Object(result)
    }
}

fn encode_annotation(annotation: &Annotation) -> Value {
    json!({
        "message": annotation.message,
        "code": annotation.code,
        "line": annotation.line,
        "location": annotation.location,
    })
}
