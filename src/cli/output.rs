//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use indicatif::{HumanBytes, HumanDuration};
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ShipConfig, ValidationResult};
use crate::deployer::DeployOutcome;
use crate::routes::{method_logical_id, Route, SynthesizedMethods};
use crate::stack::{StackDescription, StackPhase};
use crate::upload::UploadReport;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Route row for table display.
#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
}

/// Stack output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Output")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the route table and its synthesized resources.
    #[must_use]
    pub fn format_routes(&self, routes: &[Route], methods: &SynthesizedMethods) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "routes": routes
                        .iter()
                        .map(|r| serde_json::json!({
                            "method": r.http_method.as_str(),
                            "path": r.display_path(),
                            "target": r.target(),
                            "logical_id": method_logical_id(r),
                        }))
                        .collect::<Vec<_>>(),
                    "resources": methods.template_fragment(),
                    "replacements": methods.replacements,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                if routes.is_empty() {
                    return String::from("   No routes defined.\n");
                }

                let rows: Vec<RouteRow> = routes
                    .iter()
                    .map(|r| RouteRow {
                        method: r.http_method.to_string(),
                        path: r.display_path(),
                        target: r.target(),
                        logical_id: method_logical_id(r),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = write!(
                    output,
                    "\n\n{} routes, {} API method resources\n",
                    routes.len(),
                    methods.definitions.len()
                );
                output
            }
        }
    }

    /// Formats the result of a deployment.
    #[must_use]
    pub fn format_outcome(&self, outcome: &DeployOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                if outcome.no_changes {
                    let _ = writeln!(
                        output,
                        "{} No changes to deploy for {}",
                        "✓".green(),
                        outcome.stack_name.bold()
                    );
                } else {
                    let _ = writeln!(
                        output,
                        "{} Stack {} {}d ({})",
                        "✓".green(),
                        outcome.stack_name.bold(),
                        outcome.operation,
                        outcome.final_status.as_deref().unwrap_or("unknown")
                    );
                }

                if let Some(upload) = &outcome.upload {
                    output.push_str(&Self::format_upload_text(upload));
                }

                if let Some(prewarm) = &outcome.prewarm {
                    let _ = writeln!(
                        output,
                        "   Prewarmed: {}/{} routes",
                        prewarm.warmed(),
                        prewarm.checks.len()
                    );
                }

                if let Some(endpoint) = &outcome.endpoint {
                    let _ = writeln!(output, "   API Gateway Endpoint: {}", endpoint.cyan());
                }

                let _ = writeln!(output, "   Time: {}", HumanDuration(outcome.elapsed));
                output
            }
        }
    }

    /// Formats an upload summary.
    #[must_use]
    pub fn format_upload_report(&self, report: &UploadReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_upload_text(report),
        }
    }

    fn format_upload_text(report: &UploadReport) -> String {
        format!(
            "   Uploaded: {} templates ({}), code {} ({}), {} assets in {} batches ({})\n",
            report.templates,
            HumanDuration(report.phases.templates),
            HumanBytes(report.code_bytes),
            HumanDuration(report.phases.code),
            report.assets,
            report.asset_batches.len(),
            HumanDuration(report.phases.assets)
        )
    }

    /// Formats the status of a stack, or its absence.
    #[must_use]
    pub fn format_status(&self, stack_name: &str, stack: Option<&StackDescription>) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = stack.map_or_else(
                    || serde_json::json!({ "stack_name": stack_name, "exists": false }),
                    |s| {
                        serde_json::json!({
                            "stack_name": s.stack_name,
                            "exists": true,
                            "status": s.status,
                            "phase": s.phase(),
                            "reason": s.status_reason,
                            "outputs": s.outputs,
                        })
                    },
                );
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let Some(stack) = stack else {
                    return format!("\nStack {} does not exist.\n", stack_name.bold());
                };

                let mut output = String::new();
                let _ = write!(output, "\nStack: {}\n\n", stack.stack_name.bold());
                let _ = writeln!(
                    output,
                    "   Status: {} ({})",
                    Self::format_phase(stack.phase(), &stack.status),
                    stack.phase()
                );
                if let Some(reason) = &stack.status_reason {
                    let _ = writeln!(output, "   Reason: {reason}");
                }

                if !stack.outputs.is_empty() {
                    let rows: Vec<OutputRow> = stack
                        .outputs
                        .iter()
                        .map(|o| OutputRow {
                            key: o.key.clone(),
                            value: o.value.clone(),
                        })
                        .collect();
                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats a validation result and a short configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &ShipConfig,
        result: &ValidationResult,
        route_count: usize,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "stack_name": config.stack_name(),
                    "routes": route_count,
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Project: {}", config.project.name);
                let _ = writeln!(output, "   Environment: {}", config.project.environment);
                let _ = writeln!(output, "   Stack: {}", config.stack_name());
                let _ = writeln!(
                    output,
                    "   Bucket: {}",
                    config.storage.bucket.as_deref().unwrap_or("(none)")
                );
                let _ = writeln!(output, "   Routes: {route_count}");
                output
            }
        }
    }

    /// Colors a status string by phase.
    fn format_phase(phase: StackPhase, status: &str) -> String {
        match phase {
            StackPhase::Succeeded => status.green().to_string(),
            StackPhase::Failed => status.red().to_string(),
            StackPhase::Pending => status.yellow().to_string(),
        }
    }
}
