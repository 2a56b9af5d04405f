//! Source map mirroring the blueprint tree.
//!
//! Every AST node has a sibling entry here holding the byte ranges its
//! value was read from. Multi-line descriptions collect one range per line.

use crate::outcome::CharRange;
use serde::Serialize;

/// Ranges backing one AST value
pub type Ranges = Vec<CharRange>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub metadata: Vec<Ranges>,
    pub name: Ranges,
    pub description: Ranges,
    pub resource_groups: Vec<ResourceGroupMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceGroupMap {
    pub name: Ranges,
    pub description: Ranges,
    pub resources: Vec<ResourceMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMap {
    pub name: Ranges,
    pub description: Ranges,
    pub uri_template: Ranges,
    pub actions: Vec<ActionMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionMap {
    pub name: Ranges,
    pub description: Ranges,
    pub method: Ranges,
}
