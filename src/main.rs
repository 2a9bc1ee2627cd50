//! Stackship CLI entrypoint.
//!
//! This is the main entrypoint for the stackship command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use stackship::cli::{Cli, Commands, OutputFormatter};
use stackship::config::{find_config_file, ConfigParser, ConfigValidator, ShipConfig};
use stackship::deployer::{
    AutoApprove, CapabilityConfirmer, DeployOutcome, DeploymentOrchestrator, DeploymentRequest,
    StackKind, StdinConfirmer,
};
use stackship::error::{ConfigError, Result};
use stackship::lock::{
    generate_holder_id, DeployLock, LockHeartbeat, S3LockStore, LOCK_REFRESH_SECS,
};
use stackship::prewarm::HttpPrewarmer;
use stackship::routes::RouteTable;
use stackship::stack::{CloudFormationClient, StackApi, StackStatusWaiter};
use stackship::upload::{ArtifactSet, ArtifactUploader, S3ObjectStore};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Options of the deploy command.
#[derive(Debug)]
struct DeployOptions {
    minimal: bool,
    yes: bool,
    capabilities: Vec<String>,
    no_prewarm: bool,
    no_lock: bool,
}

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_cancellation() {
                eprintln!("{e}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Deploy {
            minimal,
            yes,
            capabilities,
            no_prewarm,
            no_lock,
        } => {
            let options = DeployOptions {
                minimal,
                yes,
                capabilities,
                no_prewarm,
                no_lock,
            };
            cmd_deploy(cli.config.as_ref(), options, &formatter).await
        }
        Commands::Routes => cmd_routes(cli.config.as_ref(), &formatter),
        Commands::Status => cmd_status(cli.config.as_ref(), &formatter).await,
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
    }
}

/// Deploys the stack.
async fn cmd_deploy(
    config_path: Option<&PathBuf>,
    options: DeployOptions,
    formatter: &OutputFormatter,
) -> Result<()> {
    let stack_kind = if options.minimal {
        StackKind::PartialCodeOnly
    } else {
        StackKind::Full
    };
    let config = load_config(config_path, stack_kind.is_full())?;
    let stack_name = config.stack_name();
    info!("Deploying {stack_kind} stack {stack_name}");

    let request = DeploymentRequest::from_config(&config, stack_kind)?
        .with_capabilities(options.capabilities.iter().cloned());

    let route_table = RouteTable::from_config(&config)?;
    route_table.synthesize_all(config.route_collisions)?;

    let api: Arc<dyn StackApi> =
        Arc::new(CloudFormationClient::new(config.storage.region.as_deref()).await);
    let confirmer: Arc<dyn CapabilityConfirmer> = if options.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(StdinConfirmer)
    };

    let mut orchestrator = DeploymentOrchestrator::new(Arc::clone(&api), confirmer)
        .with_waiter(StackStatusWaiter::new(Arc::clone(&api), config.waiter))
        .with_routes(route_table.routes().to_vec())
        .with_command_line(command_line());

    if config.prewarm.enable && !options.no_prewarm {
        orchestrator = orchestrator.with_prewarmer(Arc::new(HttpPrewarmer::new(&config.prewarm)?));
    }

    if !stack_kind.is_full() {
        let outcome = orchestrator.run(&request).await?;
        print_outcome(formatter, &outcome);
        return Ok(());
    }

    let bucket = config
        .storage
        .bucket
        .clone()
        .ok_or_else(|| ConfigError::missing("storage.bucket"))?;
    let store = S3ObjectStore::new(&bucket, config.storage.region.as_deref()).await;
    let lock_client = store.client().clone();

    let artifacts = ArtifactSet::from_config(&config)?;
    info!("Collected {} artifacts for upload", artifacts.len());
    let uploader = ArtifactUploader::new(Arc::new(store), config.assets.batch_size);
    let orchestrator = orchestrator.with_uploads(uploader, artifacts);

    if options.no_lock {
        warn!("Deploying without the deployment lock");
        let outcome = orchestrator.run(&request).await?;
        print_outcome(formatter, &outcome);
        return Ok(());
    }

    let lock = Arc::new(DeployLock::new(Box::new(S3LockStore::new(
        lock_client,
        &bucket,
        &config.storage.prefix,
        &stack_name,
    ))));
    let held = lock.acquire(&generate_holder_id(), &stack_name).await?;
    let heartbeat = LockHeartbeat::start(
        Arc::clone(&lock),
        held.clone(),
        Duration::from_secs(LOCK_REFRESH_SECS),
    );

    let result = orchestrator.run(&request).await;
    heartbeat.stop();

    if let Err(e) = lock.release(&held).await {
        warn!("Failed to release deployment lock: {e}");
    }

    let outcome = result?;
    print_outcome(formatter, &outcome);
    Ok(())
}

/// Shows the route table and the resources synthesized from it.
fn cmd_routes(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config(config_path, false)?;
    let table = RouteTable::from_config(&config)?;
    let methods = table.synthesize_all(config.route_collisions)?;

    eprintln!("{}", formatter.format_routes(table.routes(), &methods));
    Ok(())
}

/// Shows the current stack status.
async fn cmd_status(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config(config_path, false)?;
    let stack_name = config.stack_name();

    let client = CloudFormationClient::new(config.storage.region.as_deref()).await;
    let description = client.describe_stack(&stack_name).await?;

    eprintln!("{}", formatter.format_status(&stack_name, description.as_ref()));
    Ok(())
}

/// Validates configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;

    let table = RouteTable::from_config(&config)?;
    table.synthesize_all(config.route_collisions)?;

    eprintln!(
        "{}",
        formatter.format_validation(&config, &result, table.len(), show_warnings)
    );
    Ok(())
}

fn print_outcome(formatter: &OutputFormatter, outcome: &DeployOutcome) {
    if let Some(miss) = &outcome.discovery_miss {
        debug!("No endpoint: {miss}");
    }
    eprintln!("{}", formatter.format_outcome(outcome));
}

/// The command line as the operator typed it, for the re-run hint.
fn command_line() -> String {
    let args: Vec<String> = std::env::args().collect();
    if args.is_empty() {
        String::from("stackship deploy")
    } else {
        args.join(" ")
    }
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new("."))
}

/// Loads, overrides from the environment, and validates configuration.
fn load_config(config_path: Option<&PathBuf>, require_bucket: bool) -> Result<ShipConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    ConfigValidator::new()
        .with_bucket_required(require_bucket)
        .validate(&config)?;

    Ok(config)
}
