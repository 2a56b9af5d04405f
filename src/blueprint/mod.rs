//! Blueprint parsing
//!
//! The [`Parser`] trait is the seam between the dispatch machinery and the
//! computation it offloads. [`BlueprintParser`] is the reference
//! implementation: an outline parser for API Blueprint documents.

mod ast;
mod parser;
mod sourcemap;

pub use ast::{Action, Blueprint, Metadata, Resource, ResourceGroup};
pub use parser::BlueprintParser;
pub use sourcemap::{ActionMap, Ranges, ResourceGroupMap, ResourceMap, SourceMap};

use crate::job::Job;
use crate::outcome::ParseOutcome;

/// A pure computation from one job to one outcome.
///
/// Runs on worker threads. Input problems are reported inside the returned
/// [`ParseOutcome`], never as panics; implementations must not keep
/// references to the job after returning.
pub trait Parser: Send + Sync {
    fn parse(&self, job: &Job) -> ParseOutcome;
}

impl<F> Parser for F
where
    F: Fn(&Job) -> ParseOutcome + Send + Sync,
{
    fn parse(&self, job: &Job) -> ParseOutcome {
        self(job)
    }
}
