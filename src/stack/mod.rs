//! Remote stack integration.
//!
//! This module wraps the declarative-infrastructure API behind [`StackApi`],
//! classifies provider statuses, and polls stacks until they settle.

mod api;
mod cloudformation;
mod status;
mod types;
mod waiter;

pub use api::StackApi;
#[cfg(test)]
pub use api::MockStackApi;
pub use cloudformation::{classify_cfn_error, parse_required_capabilities, CloudFormationClient};
pub use status::{is_in_progress, StackPhase};
pub use types::{StackDescription, StackInput, StackOutput, StackResourceSummary};
pub use waiter::StackStatusWaiter;
