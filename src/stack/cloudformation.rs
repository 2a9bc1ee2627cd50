//! CloudFormation implementation of [`StackApi`].
//!
//! Provider failures are classified by error code, not by string-matching the
//! Debug output, so the orchestrator can react to capability and no-op errors.

use async_trait::async_trait;
use aws_sdk_cloudformation::error::ProvideErrorMetadata;
use aws_sdk_cloudformation::types::{Capability, Stack, StackResource, StackStatus};
use aws_sdk_cloudformation::Client;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::{Result, ShipError, StackError};

use super::api::StackApi;
use super::types::{StackDescription, StackInput, StackOutput, StackResourceSummary};

/// Error code for a mutation lacking acknowledged capabilities.
const INSUFFICIENT_CAPABILITIES_CODE: &str = "InsufficientCapabilitiesException";

/// Error code the provider uses for request validation failures.
const VALIDATION_ERROR_CODE: &str = "ValidationError";

/// Message marker of an update without changes.
const NO_UPDATES_MARKER: &str = "No updates are to be performed";

/// Message marker of a missing stack.
const DOES_NOT_EXIST_MARKER: &str = "does not exist";

/// Message marker of a capability requirement reported as a validation error.
const REQUIRES_CAPABILITIES_MARKER: &str = "Requires capabilities";

/// CloudFormation stack client.
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    /// SDK client.
    client: Client,
}

impl CloudFormationClient {
    /// Creates a client from the ambient AWS configuration.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region_str) = region {
            loader = loader.region(aws_config::Region::new(region_str.to_string()));
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }

    /// Creates a client around an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn capabilities(input: &StackInput) -> Option<Vec<Capability>> {
        if input.capabilities.is_empty() {
            None
        } else {
            Some(
                input
                    .capabilities
                    .iter()
                    .map(|c| Capability::from(c.as_str()))
                    .collect(),
            )
        }
    }
}

#[async_trait]
impl StackApi for CloudFormationClient {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        debug!("Describing stack {stack_name}");

        match self.client.describe_stacks().stack_name(stack_name).send().await {
            Ok(output) => output
                .stacks()
                .first()
                .map(|stack| to_description(stack, stack_name))
                .transpose()
                .map_err(ShipError::from),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                let message = service_err
                    .message()
                    .map_or_else(|| service_err.to_string(), str::to_string);

                if service_err.code() == Some(VALIDATION_ERROR_CODE)
                    && message.contains(DOES_NOT_EXIST_MARKER)
                {
                    debug!("Stack {stack_name} does not exist");
                    return Ok(None);
                }

                Err(classify_cfn_error("DescribeStacks", service_err.code(), &message).into())
            }
        }
    }

    async fn create_stack(&self, input: &StackInput) -> Result<()> {
        info!("Creating stack {}", input.stack_name);

        self.client
            .create_stack()
            .stack_name(&input.stack_name)
            .template_body(&input.template_body)
            .set_capabilities(Self::capabilities(input))
            .send()
            .await
            .map_err(|sdk_err| {
                let service_err = sdk_err.into_service_error();
                let message = service_err
                    .message()
                    .map_or_else(|| service_err.to_string(), str::to_string);
                ShipError::from(classify_cfn_error("CreateStack", service_err.code(), &message))
            })?;

        Ok(())
    }

    async fn update_stack(&self, input: &StackInput) -> Result<()> {
        info!("Updating stack {}", input.stack_name);

        self.client
            .update_stack()
            .stack_name(&input.stack_name)
            .template_body(&input.template_body)
            .set_capabilities(Self::capabilities(input))
            .send()
            .await
            .map_err(|sdk_err| {
                let service_err = sdk_err.into_service_error();
                let message = service_err
                    .message()
                    .map_or_else(|| service_err.to_string(), str::to_string);
                ShipError::from(classify_cfn_error("UpdateStack", service_err.code(), &message))
            })?;

        Ok(())
    }

    async fn describe_stack_resources(&self, stack_name: &str) -> Result<Vec<StackResourceSummary>> {
        debug!("Describing resources of stack {stack_name}");

        let output = self
            .client
            .describe_stack_resources()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|sdk_err| {
                let service_err = sdk_err.into_service_error();
                let message = service_err
                    .message()
                    .map_or_else(|| service_err.to_string(), str::to_string);
                ShipError::from(classify_cfn_error(
                    "DescribeStackResources",
                    service_err.code(),
                    &message,
                ))
            })?;

        Ok(output
            .stack_resources()
            .iter()
            .filter_map(to_resource_summary)
            .collect())
    }
}

fn to_description(
    stack: &Stack,
    requested_name: &str,
) -> std::result::Result<StackDescription, StackError> {
    Ok(StackDescription {
        stack_id: stack.stack_id().map(str::to_string),
        stack_name: stack.stack_name().unwrap_or(requested_name).to_string(),
        status: require_status(requested_name, stack.stack_status())?,
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs: stack
            .outputs()
            .iter()
            .filter_map(|o| {
                Some(StackOutput {
                    key: o.output_key()?.to_string(),
                    value: o.output_value()?.to_string(),
                })
            })
            .collect(),
    })
}

/// A described stack without a status cannot be classified.
fn require_status(
    stack_name: &str,
    status: Option<&StackStatus>,
) -> std::result::Result<String, StackError> {
    status.map(|s| s.as_str().to_string()).ok_or_else(|| {
        StackError::api(
            "DescribeStacks",
            format!("stack {stack_name} was described without a status"),
        )
    })
}

/// Resources without a logical id are skipped.
fn to_resource_summary(resource: &StackResource) -> Option<StackResourceSummary> {
    Some(StackResourceSummary {
        logical_id: resource.logical_resource_id()?.to_string(),
        physical_id: resource.physical_resource_id().map(str::to_string),
        resource_type: resource.resource_type().unwrap_or_default().to_string(),
        status: resource
            .resource_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
    })
}

/// Maps a provider error code and message to a [`StackError`].
#[must_use]
pub fn classify_cfn_error(operation: &'static str, code: Option<&str>, message: &str) -> StackError {
    let capabilities = parse_required_capabilities(message);

    match code {
        Some(INSUFFICIENT_CAPABILITIES_CODE) if !capabilities.is_empty() => {
            StackError::InsufficientCapabilities {
                capabilities,
                message: message.to_string(),
            }
        }
        Some(VALIDATION_ERROR_CODE) if message.contains(NO_UPDATES_MARKER) => StackError::NoUpdates {
            message: message.to_string(),
        },
        Some(VALIDATION_ERROR_CODE)
            if message.contains(REQUIRES_CAPABILITIES_MARKER) && !capabilities.is_empty() =>
        {
            StackError::InsufficientCapabilities {
                capabilities,
                message: message.to_string(),
            }
        }
        Some(VALIDATION_ERROR_CODE) => StackError::Validation {
            message: message.to_string(),
        },
        _ => StackError::api(operation, message),
    }
}

/// Extracts the capability list from a message like
/// `Requires capabilities : [CAPABILITY_IAM, CAPABILITY_NAMED_IAM]`.
#[must_use]
pub fn parse_required_capabilities(message: &str) -> BTreeSet<String> {
    let (Some(start), Some(end)) = (message.find('['), message.rfind(']')) else {
        return BTreeSet::new();
    };
    if end <= start {
        return BTreeSet::new();
    }

    message[start + 1..end]
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|c| c.trim_matches(|ch: char| ch == '"' || ch == '\''))
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
