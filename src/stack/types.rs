//! Stack API data types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::status::StackPhase;

/// Parameters shared by create-stack and update-stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackInput {
    /// Stack name.
    pub stack_name: String,
    /// Template body.
    pub template_body: String,
    /// Acknowledged capabilities.
    pub capabilities: BTreeSet<String>,
}

/// Snapshot of a stack returned by describe-stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// Stack id (ARN).
    pub stack_id: Option<String>,
    /// Stack name.
    pub stack_name: String,
    /// Provider status string.
    pub status: String,
    /// Provider status reason.
    pub status_reason: Option<String>,
    /// Declared outputs.
    pub outputs: Vec<StackOutput>,
}

/// One stack output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Output key.
    pub key: String,
    /// Output value.
    pub value: String,
}

/// One resource of a stack, as returned by describe-stack-resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResourceSummary {
    /// Template logical id.
    pub logical_id: String,
    /// Provider physical id, once created.
    pub physical_id: Option<String>,
    /// Resource type.
    pub resource_type: String,
    /// Resource status string.
    pub status: String,
}

impl StackDescription {
    /// Returns the collapsed phase of this stack.
    #[must_use]
    pub fn phase(&self) -> StackPhase {
        StackPhase::classify(&self.status)
    }

    /// Returns the value of an output by key.
    #[must_use]
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }
}
