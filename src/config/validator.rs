//! Configuration validation for deployment configs.
//!
//! All problems are collected in one pass so the operator sees every error
//! and warning at once; the first error is returned as the failure.

use crate::error::{ConfigError, Result, ShipError};
use tracing::debug;

use super::spec::ShipConfig;

/// Capabilities understood by the stack provider.
pub const KNOWN_CAPABILITIES: &[&str] = &[
    "CAPABILITY_IAM",
    "CAPABILITY_NAMED_IAM",
    "CAPABILITY_AUTO_EXPAND",
];

/// Maximum length of a stack name.
const MAX_STACK_NAME_LEN: usize = 128;

/// Validator for deployment configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Whether the artifact bucket must be configured.
    require_bucket: bool,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            require_bucket: false,
        }
    }

    /// Requires a bucket, as a full deployment uploads artifacts.
    #[must_use]
    pub const fn with_bucket_required(mut self, required: bool) -> Self {
        self.require_bucket = required;
        self
    }

    /// Validates a deployment configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &ShipConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        Self::validate_stack(config, &mut result);
        self.validate_storage(config, &mut result);
        Self::validate_assets(config, &mut result);
        Self::validate_runtime_knobs(config, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ShipError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates project configuration and the derived stack name.
    fn validate_project(config: &ShipConfig, result: &mut ValidationResult) {
        if config.project.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: String::from("Project name cannot be empty"),
            });
            return;
        }

        if config.project.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }

        let stack_name = config.stack_name();
        if !is_valid_stack_name(&stack_name) {
            result.errors.push(ValidationError {
                field: String::from("stack.name"),
                message: format!(
                    "Stack name '{stack_name}' is invalid. Must start with a letter and contain only letters, digits and hyphens."
                ),
            });
        }
    }

    /// Validates stack configuration.
    fn validate_stack(config: &ShipConfig, result: &mut ValidationResult) {
        for (i, capability) in config.stack.capabilities.iter().enumerate() {
            if !KNOWN_CAPABILITIES.contains(&capability.as_str()) {
                result.warnings.push(format!(
                    "stack.capabilities[{i}]: Unknown capability '{capability}'"
                ));
            }
        }
    }

    /// Validates storage configuration.
    fn validate_storage(&self, config: &ShipConfig, result: &mut ValidationResult) {
        let bucket_missing = config
            .storage
            .bucket
            .as_deref()
            .is_none_or(str::is_empty);

        if self.require_bucket && bucket_missing {
            result.errors.push(ValidationError {
                field: String::from("storage.bucket"),
                message: String::from("An artifact bucket is required for a full deployment"),
            });
        }

        if config.storage.prefix.trim_matches('/').is_empty() {
            result.errors.push(ValidationError {
                field: String::from("storage.prefix"),
                message: String::from("Key prefix cannot be empty"),
            });
        }
    }

    /// Validates asset configuration.
    fn validate_assets(config: &ShipConfig, result: &mut ValidationResult) {
        if config.assets.batch_size == 0 {
            result.errors.push(ValidationError {
                field: String::from("assets.batch_size"),
                message: String::from("Batch size must be at least 1"),
            });
        }

        for (i, folder) in config.assets.folders.iter().enumerate() {
            if folder.is_empty() || folder.starts_with('/') || folder.contains("..") {
                result.errors.push(ValidationError {
                    field: format!("assets.folders[{i}]"),
                    message: format!("Asset folder '{folder}' must be a relative path inside the asset root"),
                });
            }
        }

        if config.assets.folders.is_empty() {
            result
                .warnings
                .push(String::from("assets.folders: No asset folders configured"));
        }
    }

    /// Validates polling and pre-warming knobs.
    fn validate_runtime_knobs(config: &ShipConfig, result: &mut ValidationResult) {
        if config.waiter.interval_secs == 0 {
            result.errors.push(ValidationError {
                field: String::from("waiter.interval_secs"),
                message: String::from("Poll interval must be at least 1 second"),
            });
        }

        if config.waiter.timeout_secs < config.waiter.interval_secs {
            result.warnings.push(String::from(
                "waiter.timeout_secs: Timeout is shorter than one poll interval",
            ));
        }

        if config.prewarm.enable && config.prewarm.concurrency == 0 {
            result.errors.push(ValidationError {
                field: String::from("prewarm.concurrency"),
                message: String::from("Pre-warm concurrency must be at least 1"),
            });
        }
    }
}

/// Validates a stack name: a letter, then letters, digits or hyphens.
fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };

    first.is_ascii_alphabetic()
        && name.len() <= MAX_STACK_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> ShipConfig {
        ConfigParser::new().parse_yaml(yaml, None).unwrap()
    }

    #[test]
    fn test_valid_stack_name() {
        assert!(is_valid_stack_name("demo-dev"));
        assert!(is_valid_stack_name("Blog-prod-2"));
        assert!(!is_valid_stack_name(""));
        assert!(!is_valid_stack_name("1demo"));
        assert!(!is_valid_stack_name("demo_dev"));
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let config = parse("project:\n  name: demo\n");
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_bucket_required_for_full_deploy() {
        let config = parse("project:\n  name: demo\n");
        let err = ConfigValidator::new()
            .with_bucket_required(true)
            .validate(&config)
            .unwrap_err();

        assert!(matches!(
            err,
            ShipError::Config(ConfigError::ValidationError { field: Some(ref f), .. }) if f == "storage.bucket"
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = parse("project:\n  name: demo\nassets:\n  batch_size: 0\n");
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_unknown_capability_is_a_warning() {
        let config = parse("project:\n  name: demo\nstack:\n  capabilities: [CAPABILITY_ROOT]\n");
        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("CAPABILITY_ROOT"));
    }
}
