//! Remote stack API interface.
//!
//! The orchestrator and waiter only ever talk to the provider through this
//! trait, so tests can drive them against a mock.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{StackDescription, StackInput, StackResourceSummary};

/// Subset of the declarative-infrastructure API used for deployments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Describes a stack.
    ///
    /// Returns `None` if the stack does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Creates a new stack.
    async fn create_stack(&self, input: &StackInput) -> Result<()>;

    /// Updates an existing stack.
    async fn update_stack(&self, input: &StackInput) -> Result<()>;

    /// Lists the resources of a stack.
    async fn describe_stack_resources(&self, stack_name: &str) -> Result<Vec<StackResourceSummary>>;
}
