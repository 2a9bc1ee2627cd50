//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackship - route-driven CloudFormation deployments.
#[derive(Parser, Debug)]
#[command(name = "stackship")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STACKSHIP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy the application stack.
    Deploy {
        /// Deploy only the minimal parent stack, without uploading artifacts.
        #[arg(long)]
        minimal: bool,

        /// Approve capability escalation without prompting.
        #[arg(short, long)]
        yes: bool,

        /// Capabilities to acknowledge up front (repeatable).
        #[arg(long = "capabilities", value_name = "CAPABILITY")]
        capabilities: Vec<String>,

        /// Skip pre-warming after the deploy.
        #[arg(long)]
        no_prewarm: bool,

        /// Do not take the deployment lock.
        #[arg(long)]
        no_lock: bool,
    },

    /// Show the synthesized API method resources.
    Routes,

    /// Show the current stack status.
    Status,

    /// Validate the configuration and route table.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
