//! The deployment state machine.
//!
//! ```text
//! upload (full only) -> exists? -> create | update
//!   update -> insufficient capabilities -> prompt -> update | abort
//!   create | update -> wait -> succeeded | failed
//!   succeeded (full only) -> discover endpoint -> prewarm
//! ```

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::WaiterConfig;
use crate::error::{ConfigError, Result, ShipError, StackError};
use crate::prewarm::{PrewarmReport, Prewarmer};
use crate::routes::Route;
use crate::stack::{is_in_progress, StackApi, StackInput, StackPhase, StackStatusWaiter};
use crate::upload::{ArtifactSet, ArtifactUploader, UploadReport};

use super::confirm::{rerun_hint, CapabilityConfirmer};
use super::discovery::{DiscoveryMiss, EndpointDiscovery};
use super::request::DeploymentRequest;

/// Mutation issued against the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackOperation {
    /// The stack did not exist.
    Create,
    /// The stack already existed.
    Update,
}

impl StackOperation {
    const fn api_name(self) -> &'static str {
        match self {
            Self::Create => "CreateStack",
            Self::Update => "UpdateStack",
        }
    }
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    /// Stack name.
    pub stack_name: String,
    /// Mutation issued.
    pub operation: StackOperation,
    /// True if the provider reported nothing to update.
    pub no_changes: bool,
    /// Status after the run.
    pub final_status: Option<String>,
    /// Capabilities the accepted mutation carried.
    pub capabilities: BTreeSet<String>,
    /// Artifact upload summary, full deploys only.
    pub upload: Option<UploadReport>,
    /// Public endpoint, if found.
    pub endpoint: Option<String>,
    /// Why the endpoint was not found.
    pub discovery_miss: Option<DiscoveryMiss>,
    /// Pre-warm summary, if pre-warming ran.
    pub prewarm: Option<PrewarmReport>,
    /// Wall time of the run.
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Drives one deployment from upload to post-deploy actions.
pub struct DeploymentOrchestrator {
    /// Stack API.
    api: Arc<dyn StackApi>,
    /// Status poller.
    waiter: StackStatusWaiter,
    /// Capability escalation prompt.
    confirmer: Arc<dyn CapabilityConfirmer>,
    /// Uploader and the artifacts it ships, full deploys only.
    uploads: Option<(ArtifactUploader, ArtifactSet)>,
    /// Pre-warmer, absent when pre-warming is disabled.
    prewarmer: Option<Arc<dyn Prewarmer>>,
    /// Routes of the deployed application.
    routes: Vec<Route>,
    /// Command line shown in the re-run hint.
    command_line: String,
}

impl fmt::Debug for DeploymentOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentOrchestrator")
            .field("waiter", &self.waiter)
            .field("uploads", &self.uploads.is_some())
            .field("prewarmer", &self.prewarmer.is_some())
            .field("routes", &self.routes.len())
            .field("command_line", &self.command_line)
            .finish_non_exhaustive()
    }
}

impl DeploymentOrchestrator {
    /// Creates an orchestrator with default polling and no uploads.
    #[must_use]
    pub fn new(api: Arc<dyn StackApi>, confirmer: Arc<dyn CapabilityConfirmer>) -> Self {
        let waiter = StackStatusWaiter::new(Arc::clone(&api), WaiterConfig::default());
        Self {
            api,
            waiter,
            confirmer,
            uploads: None,
            prewarmer: None,
            routes: Vec::new(),
            command_line: String::from("stackship deploy"),
        }
    }

    /// Replaces the status poller.
    #[must_use]
    pub fn with_waiter(mut self, waiter: StackStatusWaiter) -> Self {
        self.waiter = waiter;
        self
    }

    /// Sets the uploader and artifacts shipped by full deploys.
    #[must_use]
    pub fn with_uploads(mut self, uploader: ArtifactUploader, artifacts: ArtifactSet) -> Self {
        self.uploads = Some((uploader, artifacts));
        self
    }

    /// Enables pre-warming.
    #[must_use]
    pub fn with_prewarmer(mut self, prewarmer: Arc<dyn Prewarmer>) -> Self {
        self.prewarmer = Some(prewarmer);
        self
    }

    /// Sets the application routes.
    #[must_use]
    pub fn with_routes(mut self, routes: Vec<Route>) -> Self {
        self.routes = routes;
        self
    }

    /// Sets the command line shown when asking for capabilities.
    #[must_use]
    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    /// Runs the deployment.
    ///
    /// # Errors
    ///
    /// Returns an upload error, a stack API error, [`StackError::InProgress`]
    /// if the stack is busy, [`StackError::Declined`] if the operator refused
    /// the capabilities, [`StackError::Failed`] if the stack settled in a
    /// failed state, or [`StackError::WaitTimeout`].
    pub async fn run(&self, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let start = Instant::now();
        let stack_name = request.stack_name.as_str();

        let upload = if request.stack_kind.is_full() {
            let (uploader, artifacts) = self
                .uploads
                .as_ref()
                .ok_or_else(|| ConfigError::missing("storage.bucket"))?;
            Some(uploader.upload(artifacts).await?)
        } else {
            None
        };

        let operation = match self.api.describe_stack(stack_name).await? {
            Some(existing) if is_in_progress(&existing.status) => {
                return Err(StackError::InProgress {
                    stack_name: stack_name.to_string(),
                    status: existing.status,
                }
                .into());
            }
            Some(_) => StackOperation::Update,
            None => StackOperation::Create,
        };

        info!("Deploying stack {stack_name} ({operation}, {})", request.stack_kind);

        let (capabilities, no_changes) = self.mutate(request, operation).await?;

        let final_status = if no_changes {
            self.api
                .describe_stack(stack_name)
                .await?
                .map(|d| d.status)
        } else {
            let settled = self.waiter.wait(stack_name).await?;
            if settled.phase() == StackPhase::Failed {
                return Err(StackError::Failed {
                    stack_name: stack_name.to_string(),
                    status: settled.status,
                    reason: settled.status_reason,
                }
                .into());
            }
            Some(settled.status)
        };

        let mut outcome = DeployOutcome {
            stack_name: stack_name.to_string(),
            operation,
            no_changes,
            final_status,
            capabilities,
            upload,
            endpoint: None,
            discovery_miss: None,
            prewarm: None,
            elapsed: Duration::ZERO,
        };

        if request.stack_kind.is_full() {
            self.post_deploy(&mut outcome).await;
        }

        outcome.elapsed = start.elapsed();
        Ok(outcome)
    }

    /// Issues the mutation, retrying once per approved capability escalation.
    ///
    /// Returns the accepted capability set and whether the provider reported
    /// nothing to do.
    async fn mutate(
        &self,
        request: &DeploymentRequest,
        operation: StackOperation,
    ) -> Result<(BTreeSet<String>, bool)> {
        let mut input = StackInput {
            stack_name: request.stack_name.clone(),
            template_body: request.template_body.clone(),
            capabilities: request.capabilities.clone(),
        };

        loop {
            let result = match operation {
                StackOperation::Create => self.api.create_stack(&input).await,
                StackOperation::Update => self.api.update_stack(&input).await,
            };

            match result {
                Ok(()) => return Ok((input.capabilities, false)),
                Err(ShipError::Stack(StackError::NoUpdates { message })) => {
                    info!("No changes to deploy: {message}");
                    return Ok((input.capabilities, true));
                }
                Err(ShipError::Stack(StackError::InsufficientCapabilities {
                    capabilities: required,
                    message,
                })) => {
                    if required.is_subset(&input.capabilities) {
                        return Err(StackError::api(operation.api_name(), message).into());
                    }

                    let mut merged = input.capabilities.clone();
                    merged.extend(required.iter().cloned());
                    let hint = rerun_hint(&self.command_line, &merged);

                    if !self.confirmer.confirm(&required, &hint)? {
                        warn!("Capabilities declined, stopping");
                        return Err(StackError::Declined {
                            capabilities: required,
                        }
                        .into());
                    }

                    info!("Re-running: {hint}");
                    input.capabilities = merged;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Discovers the endpoint and warms the routes. Never fails.
    ///
    /// A discovery miss is recorded and pre-warming still runs; the prewarmer
    /// decides what to do without an endpoint.
    async fn post_deploy(&self, outcome: &mut DeployOutcome) {
        if self.routes.is_empty() {
            debug!("No routes, skipping endpoint discovery and prewarm");
            outcome.discovery_miss = Some(DiscoveryMiss::NoRoutes);
            return;
        }

        let discovery = EndpointDiscovery::new(Arc::clone(&self.api));
        match discovery.discover(&outcome.stack_name).await {
            Ok(endpoint) => {
                info!("API Gateway Endpoint: {endpoint}");
                outcome.endpoint = Some(endpoint);
            }
            Err(miss) => {
                debug!("Endpoint not found: {miss}");
                outcome.discovery_miss = Some(miss);
            }
        }

        let Some(prewarmer) = &self.prewarmer else {
            debug!("Prewarming disabled");
            return;
        };

        if self.routes.iter().any(Route::is_static_get) {
            info!("Prewarming application");
            outcome.prewarm = Some(
                prewarmer
                    .prewarm(outcome.endpoint.as_deref(), &self.routes)
                    .await,
            );
        } else {
            debug!("No static GET routes, skipping prewarm");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployer::StackKind;
    use crate::error::{UploadError, EXIT_DECLINED, EXIT_STACK_FAILED};
    use crate::routes::HttpMethod;
    use crate::stack::{MockStackApi, StackDescription, StackOutput, StackResourceSummary};
    use crate::upload::{ObjectStore, UploadTask};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn stack(name: &str, status: &str) -> StackDescription {
        StackDescription {
            stack_id: None,
            stack_name: name.to_string(),
            status: status.to_string(),
            status_reason: Some("reason".to_string()),
            outputs: Vec::new(),
        }
    }

    fn caps(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn capability_error(items: &[&str]) -> ShipError {
        ShipError::Stack(StackError::InsufficientCapabilities {
            capabilities: caps(items),
            message: "Requires capabilities".to_string(),
        })
    }

    struct ScriptedConfirmer {
        answer: bool,
        prompts: Mutex<Vec<(BTreeSet<String>, String)>>,
    }

    impl ScriptedConfirmer {
        fn new(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl CapabilityConfirmer for ScriptedConfirmer {
        fn confirm(&self, capabilities: &BTreeSet<String>, rerun_hint: &str) -> Result<bool> {
            self.prompts
                .lock()
                .unwrap()
                .push((capabilities.clone(), rerun_hint.to_string()));
            Ok(self.answer)
        }
    }

    struct LoggingStore {
        log: Log,
    }

    #[async_trait]
    impl ObjectStore for LoggingStore {
        async fn put_file(&self, task: &UploadTask) -> Result<()> {
            self.log.lock().unwrap().push(format!("put {}", task.remote_key));
            Ok(())
        }

        fn bucket(&self) -> &str {
            "bucket"
        }
    }

    #[derive(Default)]
    struct RecordingPrewarmer {
        endpoints: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Prewarmer for RecordingPrewarmer {
        async fn prewarm(&self, endpoint: Option<&str>, _routes: &[Route]) -> PrewarmReport {
            self.endpoints
                .lock()
                .unwrap()
                .push(endpoint.map(str::to_string));
            PrewarmReport::default()
        }
    }

    fn orchestrator(mock: MockStackApi, confirmer: Arc<ScriptedConfirmer>) -> DeploymentOrchestrator {
        let api: Arc<dyn StackApi> = Arc::new(mock);
        let waiter = StackStatusWaiter::with_timing(
            Arc::clone(&api),
            Duration::from_millis(1),
            Duration::from_secs(5),
        );
        DeploymentOrchestrator::new(api, confirmer).with_waiter(waiter)
    }

    fn minimal_request() -> DeploymentRequest {
        DeploymentRequest::new("demo-dev", "Resources: {}", StackKind::PartialCodeOnly)
    }

    #[tokio::test]
    async fn test_creates_absent_stack() {
        let polls = AtomicUsize::new(0);
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(move |name| {
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(Some(stack(name, "CREATE_COMPLETE")))
            }
        });
        mock.expect_create_stack().times(1).returning(|_| Ok(()));
        mock.expect_update_stack().times(0);

        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&minimal_request())
            .await
            .unwrap();

        assert_eq!(outcome.operation, StackOperation::Create);
        assert_eq!(outcome.final_status.as_deref(), Some("CREATE_COMPLETE"));
        assert!(outcome.upload.is_none());
    }

    #[tokio::test]
    async fn test_updates_existing_stack() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack().times(1).returning(|_| Ok(()));
        mock.expect_create_stack().times(0);

        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&minimal_request())
            .await
            .unwrap();

        assert_eq!(outcome.operation, StackOperation::Update);
        assert!(!outcome.no_changes);
    }

    #[tokio::test]
    async fn test_capability_retry_merges_once() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack()
            .withf(|input| input.capabilities == caps(&["CAPABILITY_AUTO_EXPAND"]))
            .times(1)
            .returning(|_| Err(capability_error(&["CAPABILITY_IAM", "CAPABILITY_AUTO_EXPAND"])));
        mock.expect_update_stack()
            .withf(|input| input.capabilities == caps(&["CAPABILITY_AUTO_EXPAND", "CAPABILITY_IAM"]))
            .times(1)
            .returning(|_| Ok(()));

        let confirmer = ScriptedConfirmer::new(true);
        let request = minimal_request().with_capabilities(["CAPABILITY_AUTO_EXPAND"]);
        let outcome = orchestrator(mock, Arc::clone(&confirmer))
            .with_command_line("stackship deploy")
            .run(&request)
            .await
            .unwrap();

        assert_eq!(
            outcome.capabilities,
            caps(&["CAPABILITY_AUTO_EXPAND", "CAPABILITY_IAM"])
        );

        let prompts = confirmer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, caps(&["CAPABILITY_AUTO_EXPAND", "CAPABILITY_IAM"]));
        assert_eq!(
            prompts[0].1,
            "stackship deploy --capabilities CAPABILITY_AUTO_EXPAND --capabilities CAPABILITY_IAM"
        );
    }

    #[tokio::test]
    async fn test_decline_stops_mutations() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .times(1)
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack()
            .times(1)
            .returning(|_| Err(capability_error(&["CAPABILITY_NAMED_IAM"])));
        mock.expect_create_stack().times(0);

        let err = orchestrator(mock, ScriptedConfirmer::new(false))
            .run(&minimal_request())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::Stack(StackError::Declined { .. })));
        assert_eq!(err.exit_code(), EXIT_DECLINED);
    }

    #[tokio::test]
    async fn test_already_granted_capabilities_do_not_loop() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack()
            .times(1)
            .returning(|_| Err(capability_error(&["CAPABILITY_IAM"])));

        let confirmer = ScriptedConfirmer::new(true);
        let request = minimal_request().with_capabilities(["CAPABILITY_IAM"]);
        let err = orchestrator(mock, Arc::clone(&confirmer))
            .run(&request)
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::Stack(StackError::Api { operation: "UpdateStack", .. })));
        assert!(confirmer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_updates_is_success() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .times(2)
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack().times(1).returning(|_| {
            Err(ShipError::Stack(StackError::NoUpdates {
                message: "No updates are to be performed.".to_string(),
            }))
        });

        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&minimal_request())
            .await
            .unwrap();

        assert!(outcome.no_changes);
        assert_eq!(outcome.final_status.as_deref(), Some("UPDATE_COMPLETE"));
    }

    #[tokio::test]
    async fn test_failed_stack_is_reported() {
        let polls = AtomicUsize::new(0);
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(move |name| {
            let status = match polls.fetch_add(1, Ordering::SeqCst) {
                0 => "UPDATE_COMPLETE",
                1 => "UPDATE_IN_PROGRESS",
                _ => "UPDATE_ROLLBACK_COMPLETE",
            };
            Ok(Some(stack(name, status)))
        });
        mock.expect_update_stack().times(1).returning(|_| Ok(()));

        let err = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&minimal_request())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShipError::Stack(StackError::Failed { ref status, .. }) if status == "UPDATE_ROLLBACK_COMPLETE"
        ));
        assert_eq!(err.exit_code(), EXIT_STACK_FAILED);
    }

    #[tokio::test]
    async fn test_busy_stack_is_not_touched() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .times(1)
            .returning(|name| Ok(Some(stack(name, "UPDATE_IN_PROGRESS"))));
        mock.expect_update_stack().times(0);
        mock.expect_create_stack().times(0);

        let err = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&minimal_request())
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::Stack(StackError::InProgress { .. })));
    }

    #[tokio::test]
    async fn test_full_deploy_uploads_before_mutation() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let polls = AtomicUsize::new(0);

        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(move |name| {
            if name == "demo-dev-ApiGateway-1" {
                let mut nested = stack(name, "CREATE_COMPLETE");
                nested.outputs.push(StackOutput {
                    key: "RestApiUrl".to_string(),
                    value: "https://api.example.com/dev/".to_string(),
                });
                return Ok(Some(nested));
            }
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(Some(stack(name, "CREATE_COMPLETE")))
            }
        });
        let create_log = Arc::clone(&log);
        mock.expect_create_stack().times(1).returning(move |_| {
            create_log.lock().unwrap().push("create".to_string());
            Ok(())
        });
        mock.expect_describe_stack_resources().returning(|_| {
            Ok(vec![StackResourceSummary {
                logical_id: "ApiGateway".to_string(),
                physical_id: Some("demo-dev-ApiGateway-1".to_string()),
                resource_type: "AWS::CloudFormation::Stack".to_string(),
                status: "CREATE_COMPLETE".to_string(),
            }])
        });

        let store = Arc::new(LoggingStore {
            log: Arc::clone(&log),
        });
        let artifacts = ArtifactSet {
            templates: vec![UploadTask::new("a.yml", "stackship/cfn-templates/demo-dev-a.yml")],
            code: None,
            assets: vec![UploadTask::new("app.js", "stackship/public/packs/app.js")],
        };
        let prewarmer = Arc::new(RecordingPrewarmer::default());

        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .with_uploads(ArtifactUploader::new(store, 10), artifacts)
            .with_prewarmer(prewarmer.clone())
            .with_routes(vec![Route::new(HttpMethod::Get, "", "HomeController", "index")])
            .run(&DeploymentRequest::new("demo-dev", "{}", StackKind::Full))
            .await
            .unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "put stackship/cfn-templates/demo-dev-a.yml",
                "put stackship/public/packs/app.js",
                "create"
            ]
        );
        assert_eq!(outcome.upload.map(|u| u.assets), Some(1));
        assert_eq!(outcome.endpoint.as_deref(), Some("https://api.example.com/dev/"));
        assert_eq!(
            prewarmer.endpoints.lock().unwrap().clone(),
            vec![Some("https://api.example.com/dev/".to_string())]
        );
    }

    #[tokio::test]
    async fn test_full_deploy_without_bucket_fails_early() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().times(0);

        let err = orchestrator(mock, ScriptedConfirmer::new(true))
            .run(&DeploymentRequest::new("demo-dev", "{}", StackKind::Full))
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::Config(ConfigError::Missing { .. })));
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_before_mutation() {
        struct FailingStore;

        #[async_trait]
        impl ObjectStore for FailingStore {
            async fn put_file(&self, task: &UploadTask) -> Result<()> {
                Err(UploadError::put("bucket", &task.remote_key, "denied").into())
            }

            fn bucket(&self) -> &str {
                "bucket"
            }
        }

        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().times(0);
        mock.expect_create_stack().times(0);
        mock.expect_update_stack().times(0);

        let artifacts = ArtifactSet {
            templates: vec![UploadTask::new("a.yml", "stackship/cfn-templates/demo-dev-a.yml")],
            code: None,
            assets: Vec::new(),
        };

        let err = orchestrator(mock, ScriptedConfirmer::new(true))
            .with_uploads(ArtifactUploader::new(Arc::new(FailingStore), 10), artifacts)
            .run(&DeploymentRequest::new("demo-dev", "{}", StackKind::Full))
            .await
            .unwrap_err();

        assert!(matches!(err, ShipError::Upload(UploadError::Put { .. })));
    }

    #[tokio::test]
    async fn test_missing_api_resource_is_not_fatal() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack().returning(|_| {
            Err(ShipError::Stack(StackError::NoUpdates {
                message: "No updates are to be performed.".to_string(),
            }))
        });
        mock.expect_describe_stack_resources()
            .returning(|_| Ok(Vec::new()));

        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .with_uploads(
                ArtifactUploader::new(Arc::new(LoggingStore { log }), 10),
                ArtifactSet::default(),
            )
            .with_routes(vec![Route::new(HttpMethod::Get, "", "HomeController", "index")])
            .run(&DeploymentRequest::new("demo-dev", "{}", StackKind::Full))
            .await
            .unwrap();

        assert!(outcome.endpoint.is_none());
        assert_eq!(outcome.discovery_miss, Some(DiscoveryMiss::NoApiResource));
    }

    fn api_gateway_resource() -> StackResourceSummary {
        StackResourceSummary {
            logical_id: "ApiGateway".to_string(),
            physical_id: Some("demo-dev-ApiGateway-1".to_string()),
            resource_type: "AWS::CloudFormation::Stack".to_string(),
            status: "UPDATE_COMPLETE".to_string(),
        }
    }

    /// An existing stack whose update succeeds and whose endpoint is discoverable.
    fn discoverable_stack() -> MockStackApi {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(|name| {
            let mut described = stack(name, "UPDATE_COMPLETE");
            if name == "demo-dev-ApiGateway-1" {
                described.outputs.push(StackOutput {
                    key: "RestApiUrl".to_string(),
                    value: "https://api.example.com/dev/".to_string(),
                });
            }
            Ok(Some(described))
        });
        mock.expect_update_stack().returning(|_| Ok(()));
        mock.expect_describe_stack_resources()
            .returning(|_| Ok(vec![api_gateway_resource()]));
        mock
    }

    fn full_deploy(orchestrator: DeploymentOrchestrator) -> DeploymentOrchestrator {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        orchestrator.with_uploads(
            ArtifactUploader::new(Arc::new(LoggingStore { log }), 10),
            ArtifactSet::default(),
        )
    }

    fn full_request() -> DeploymentRequest {
        DeploymentRequest::new("demo-dev", "{}", StackKind::Full)
    }

    #[tokio::test]
    async fn test_discovery_miss_still_prewarms() {
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack().times(1).returning(|_| Ok(()));
        mock.expect_describe_stack_resources()
            .returning(|_| Ok(Vec::new()));

        let prewarmer = Arc::new(RecordingPrewarmer::default());
        let outcome = full_deploy(orchestrator(mock, ScriptedConfirmer::new(true)))
            .with_prewarmer(prewarmer.clone())
            .with_routes(vec![Route::new(HttpMethod::Get, "posts", "PostsController", "index")])
            .run(&full_request())
            .await
            .unwrap();

        assert_eq!(outcome.discovery_miss, Some(DiscoveryMiss::NoApiResource));
        assert!(outcome.endpoint.is_none());
        assert!(outcome.prewarm.is_some());
        assert_eq!(prewarmer.endpoints.lock().unwrap().clone(), vec![None]);
    }

    #[tokio::test]
    async fn test_capability_retry_on_create() {
        let polls = AtomicUsize::new(0);
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack().returning(move |name| {
            if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(Some(stack(name, "CREATE_COMPLETE")))
            }
        });
        mock.expect_create_stack()
            .withf(|input| input.capabilities.is_empty())
            .times(1)
            .returning(|_| Err(capability_error(&["CAPABILITY_IAM"])));
        mock.expect_create_stack()
            .withf(|input| input.capabilities == caps(&["CAPABILITY_IAM"]))
            .times(1)
            .returning(|_| Ok(()));
        mock.expect_update_stack().times(0);

        let confirmer = ScriptedConfirmer::new(true);
        let outcome = orchestrator(mock, Arc::clone(&confirmer))
            .run(&minimal_request())
            .await
            .unwrap();

        assert_eq!(outcome.operation, StackOperation::Create);
        assert_eq!(outcome.capabilities, caps(&["CAPABILITY_IAM"]));
        assert_eq!(outcome.final_status.as_deref(), Some("CREATE_COMPLETE"));
        assert_eq!(confirmer.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prewarm_disabled_still_reports_endpoint() {
        let outcome = full_deploy(orchestrator(discoverable_stack(), ScriptedConfirmer::new(true)))
            .with_routes(vec![Route::new(HttpMethod::Get, "", "HomeController", "index")])
            .run(&full_request())
            .await
            .unwrap();

        assert_eq!(outcome.endpoint.as_deref(), Some("https://api.example.com/dev/"));
        assert!(outcome.discovery_miss.is_none());
        assert!(outcome.prewarm.is_none());
    }

    #[tokio::test]
    async fn test_dynamic_routes_skip_prewarm() {
        let prewarmer = Arc::new(RecordingPrewarmer::default());
        let outcome = full_deploy(orchestrator(discoverable_stack(), ScriptedConfirmer::new(true)))
            .with_prewarmer(prewarmer.clone())
            .with_routes(vec![
                Route::new(HttpMethod::Get, "posts/:id", "PostsController", "show"),
                Route::new(HttpMethod::Post, "posts", "PostsController", "create"),
            ])
            .run(&full_request())
            .await
            .unwrap();

        assert_eq!(outcome.endpoint.as_deref(), Some("https://api.example.com/dev/"));
        assert!(outcome.prewarm.is_none());
        assert!(prewarmer.endpoints.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_minimal_deploy_skips_post_deploy() {
        let prewarmer = Arc::new(RecordingPrewarmer::default());
        let mut mock = MockStackApi::new();
        mock.expect_describe_stack()
            .returning(|name| Ok(Some(stack(name, "UPDATE_COMPLETE"))));
        mock.expect_update_stack().times(1).returning(|_| Ok(()));
        mock.expect_describe_stack_resources().times(0);

        let outcome = orchestrator(mock, ScriptedConfirmer::new(true))
            .with_prewarmer(prewarmer.clone())
            .with_routes(vec![Route::new(HttpMethod::Get, "", "HomeController", "index")])
            .run(&minimal_request())
            .await
            .unwrap();

        assert!(outcome.prewarm.is_none());
        assert!(prewarmer.endpoints.lock().unwrap().is_empty());
    }
}
