//! Public endpoint discovery.
//!
//! The REST API lives in a nested stack registered in the parent under a fixed
//! logical id. Its URL is an output of that nested stack.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::stack::StackApi;

/// Logical id of the nested API stack in the parent template.
pub const API_GATEWAY_LOGICAL_ID: &str = "ApiGateway";

/// Output of the nested API stack holding the endpoint URL.
pub const REST_API_URL_OUTPUT: &str = "RestApiUrl";

/// Why no endpoint was found. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DiscoveryMiss {
    /// The application has no routes, so there is no API.
    NoRoutes,
    /// The parent stack could not be described.
    StackMissing,
    /// The parent stack is in a rollback state.
    RolledBack(String),
    /// The parent stack has no API resource.
    NoApiResource,
    /// The nested API stack could not be described.
    NestedStackMissing(String),
    /// The nested API stack has no URL output.
    NoOutput,
    /// A lookup call failed.
    Lookup(String),
}

impl fmt::Display for DiscoveryMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRoutes => write!(f, "no routes defined"),
            Self::StackMissing => write!(f, "stack not found"),
            Self::RolledBack(status) => write!(f, "stack is in {status}"),
            Self::NoApiResource => write!(f, "no {API_GATEWAY_LOGICAL_ID} resource"),
            Self::NestedStackMissing(id) => write!(f, "nested stack {id} not found"),
            Self::NoOutput => write!(f, "no {REST_API_URL_OUTPUT} output"),
            Self::Lookup(message) => write!(f, "lookup failed: {message}"),
        }
    }
}

/// Finds the public URL of a deployed stack.
pub struct EndpointDiscovery {
    /// Stack API.
    api: Arc<dyn StackApi>,
}

impl fmt::Debug for EndpointDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDiscovery").finish_non_exhaustive()
    }
}

impl EndpointDiscovery {
    /// Creates a discovery over the given API.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>) -> Self {
        Self { api }
    }

    /// Returns the endpoint URL of `stack_name`, or why there is none.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryMiss`]; callers log it and move on.
    pub async fn discover(&self, stack_name: &str) -> Result<String, DiscoveryMiss> {
        let parent = self
            .api
            .describe_stack(stack_name)
            .await
            .map_err(|e| DiscoveryMiss::Lookup(e.to_string()))?
            .ok_or(DiscoveryMiss::StackMissing)?;

        if parent.status.contains("ROLLBACK") {
            return Err(DiscoveryMiss::RolledBack(parent.status));
        }

        let resources = self
            .api
            .describe_stack_resources(stack_name)
            .await
            .map_err(|e| DiscoveryMiss::Lookup(e.to_string()))?;

        let nested_id = resources
            .into_iter()
            .find(|r| r.logical_id == API_GATEWAY_LOGICAL_ID)
            .and_then(|r| r.physical_id)
            .ok_or(DiscoveryMiss::NoApiResource)?;

        debug!("API stack of {stack_name} is {nested_id}");

        let nested = self
            .api
            .describe_stack(&nested_id)
            .await
            .map_err(|e| DiscoveryMiss::Lookup(e.to_string()))?
            .ok_or_else(|| DiscoveryMiss::NestedStackMissing(nested_id.clone()))?;

        nested
            .output(REST_API_URL_OUTPUT)
            .map(str::to_string)
            .ok_or(DiscoveryMiss::NoOutput)
    }
}
