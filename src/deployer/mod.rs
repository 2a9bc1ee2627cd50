//! Deployment orchestration.
//!
//! Ties the uploader, the stack API and the waiter together into one run,
//! including the operator-gated capability retry and post-deploy actions.

mod confirm;
mod discovery;
mod orchestrator;
mod request;

pub use confirm::{is_approval, rerun_hint, AutoApprove, CapabilityConfirmer, StdinConfirmer};
pub use discovery::{DiscoveryMiss, EndpointDiscovery, API_GATEWAY_LOGICAL_ID, REST_API_URL_OUTPUT};
pub use orchestrator::{DeployOutcome, DeploymentOrchestrator, StackOperation};
pub use request::{DeploymentRequest, StackKind};
