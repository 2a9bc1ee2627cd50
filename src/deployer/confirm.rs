//! Operator approval of capability escalation.

use colored::Colorize;
use std::collections::BTreeSet;
use std::io::Write;
use tracing::info;

use crate::error::Result;

/// Asks whether a mutation may be retried with more capabilities.
pub trait CapabilityConfirmer: Send + Sync {
    /// Returns true if the operator approves `capabilities`.
    ///
    /// `rerun_hint` is the command line that would acknowledge them up front.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be read.
    fn confirm(&self, capabilities: &BTreeSet<String>, rerun_hint: &str) -> Result<bool>;
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmer;

impl CapabilityConfirmer for StdinConfirmer {
    fn confirm(&self, capabilities: &BTreeSet<String>, rerun_hint: &str) -> Result<bool> {
        let list = capabilities.iter().cloned().collect::<Vec<_>>().join(", ");

        eprintln!(
            "\n{} This stack needs the {} capabilities.",
            "!".yellow().bold(),
            list.bold()
        );
        eprintln!("Approve to run the deployment again with them:");
        eprintln!("  {}", rerun_hint.cyan());
        eprint!("Please confirm (y/n): ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        Ok(is_approval(&input))
    }
}

/// Approves every escalation without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl CapabilityConfirmer for AutoApprove {
    fn confirm(&self, capabilities: &BTreeSet<String>, _rerun_hint: &str) -> Result<bool> {
        info!(
            "Auto-approving capabilities: {}",
            capabilities.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        Ok(true)
    }
}

/// Returns true for any answer starting with `y` or `Y`.
#[must_use]
pub fn is_approval(input: &str) -> bool {
    input
        .trim_start()
        .chars()
        .next()
        .is_some_and(|c| c.eq_ignore_ascii_case(&'y'))
}

/// Builds the command line that acknowledges `capabilities` up front.
#[must_use]
pub fn rerun_hint(base_command: &str, capabilities: &BTreeSet<String>) -> String {
    let mut hint = base_command.trim().to_string();
    for capability in capabilities {
        hint.push_str(" --capabilities ");
        hint.push_str(capability);
    }
    hint
}
