//! CLI module for stackship.
//!
//! This module provides the command-line interface for deploying and
//! inspecting application stacks.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
