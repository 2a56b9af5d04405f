//! Blueprint syntax tree
//!
//! Field names serialize in camelCase to match the AST media type consumed by
//! blueprint tooling.

use serde::Serialize;

/// A parsed API blueprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    /// Leading `Key: value` lines
    pub metadata: Vec<Metadata>,

    /// API name from the first level-1 heading
    pub name: String,

    /// Free text following the API name
    pub description: String,

    pub resource_groups: Vec<ResourceGroup>,
}

impl Blueprint {
    /// Iterate all resources across groups
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resource_groups.iter().flat_map(|g| g.resources.iter())
    }

    pub fn action_count(&self) -> usize {
        self.resources().map(|r| r.actions.len()).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

/// `# Group <name>` section; an unnamed group holds resources declared
/// before any explicit group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub name: String,
    pub description: String,
    pub resources: Vec<Resource>,
}

/// `## <name> [<uri>]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    pub description: String,
    pub uri_template: String,
    pub actions: Vec<Action>,
}

/// `### <name> [<METHOD>]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    pub description: String,
    pub method: String,
}
