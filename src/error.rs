//! Error types for the stackship deployment system.
//!
//! This module provides the error hierarchy for every phase of a deployment:
//! configuration, route synthesis, artifact upload, stack mutation and polling,
//! and the optional deployment lock.

use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for a successful run.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit status for a failure that happened before or outside the stack lifecycle.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status when the stack was accepted but finished in a failed state.
pub const EXIT_STACK_FAILED: u8 = 2;

/// Exit status when the operator declined a capability escalation.
pub const EXIT_DECLINED: u8 = 3;

/// Exit status when polling gave up before the stack became terminal.
pub const EXIT_WAIT_TIMEOUT: u8 = 4;

/// The main error type for stackship.
#[derive(Debug, Error)]
pub enum ShipError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Route table and resource synthesis errors.
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Artifact upload errors.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Remote stack errors.
    #[error("Stack error: {0}")]
    Stack(#[from] StackError),

    /// Deployment lock errors.
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A value needed for the requested operation is not configured.
    #[error("Missing configuration value: {field}")]
    Missing {
        /// Dotted path of the missing field.
        field: String,
    },
}

/// Route table and resource synthesis errors.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A route target was not in `controller#action` form.
    #[error("Invalid route target '{target}': expected controller#action")]
    InvalidTarget {
        /// The offending target string.
        target: String,
    },

    /// An HTTP method was not recognized.
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The offending method string.
        method: String,
    },

    /// Two routes reduced to the same logical id.
    #[error(
        "Routes '{first}' and '{second}' both synthesize logical id {logical_id} \
         (ids derive from the path only, so one path cannot carry two methods)"
    )]
    DuplicateLogicalId {
        /// The colliding logical id.
        logical_id: String,
        /// The route that claimed the id first.
        first: String,
        /// The route that collided with it.
        second: String,
    },
}

/// Artifact upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// No bucket is configured but the deployment needs one.
    #[error("No artifact bucket configured")]
    MissingBucket,

    /// A local artifact could not be read.
    #[error("Failed to read {path}: {message}")]
    Read {
        /// Local path of the artifact.
        path: PathBuf,
        /// Description of the read failure.
        message: String,
    },

    /// The object store rejected a put.
    #[error("Failed to upload s3://{bucket}/{key}: {message}")]
    Put {
        /// Destination bucket.
        bucket: String,
        /// Destination key.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// An upload worker terminated abnormally.
    #[error("Upload worker failed: {message}")]
    Worker {
        /// Description of the worker failure.
        message: String,
    },
}

/// Remote stack errors.
#[derive(Debug, Error)]
pub enum StackError {
    /// The mutation needs capabilities that were not acknowledged.
    #[error("Stack requires capabilities {}: {message}", join(.capabilities))]
    InsufficientCapabilities {
        /// Capabilities named by the provider.
        capabilities: BTreeSet<String>,
        /// Raw provider message.
        message: String,
    },

    /// The update contained no changes.
    #[error("No updates to perform: {message}")]
    NoUpdates {
        /// Raw provider message.
        message: String,
    },

    /// The provider rejected the request as invalid.
    #[error("Stack validation error: {message}")]
    Validation {
        /// Raw provider message.
        message: String,
    },

    /// Any other API failure.
    #[error("{operation} failed: {message}")]
    Api {
        /// Operation that failed.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The stack does not exist.
    #[error("Stack not found: {stack_name}")]
    NotFound {
        /// Name of the stack.
        stack_name: String,
    },

    /// Another operation is still running on the stack.
    #[error("Stack {stack_name} is busy ({status}); wait for it to settle and retry")]
    InProgress {
        /// Name of the stack.
        stack_name: String,
        /// Current status string.
        status: String,
    },

    /// The stack reached a failed terminal state.
    #[error("Stack {stack_name} finished with status {status}{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Failed {
        /// Name of the stack.
        stack_name: String,
        /// Final status string.
        status: String,
        /// Provider status reason, if any.
        reason: Option<String>,
    },

    /// Polling gave up before the stack settled.
    #[error("Timed out after {waited_secs}s waiting for stack {stack_name} (last status: {last_status})")]
    WaitTimeout {
        /// Name of the stack.
        stack_name: String,
        /// Last status observed.
        last_status: String,
        /// Seconds spent waiting.
        waited_secs: u64,
    },

    /// The operator declined the capability escalation.
    #[error("Deployment cancelled: capabilities {} were not approved", join(.capabilities))]
    Declined {
        /// Capabilities that were requested.
        capabilities: BTreeSet<String>,
    },
}

/// Deployment lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock is held by another deployment.
    #[error("Deployment is locked by {holder} since {since}")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// The lock object could not be read or written.
    #[error("Lock backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// The lock was removed or replaced while we held it.
    #[error("Deployment lock {lock_id} was lost")]
    Lost {
        /// Identifier of the lock we held.
        lock_id: String,
    },

    /// The lock object is not valid JSON.
    #[error("Lock is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

/// Result type alias for stackship operations.
pub type Result<T> = std::result::Result<T, ShipError>;

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl ShipError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the process exit status for this error.
    ///
    /// Automation relies on these staying distinct: a stack that failed after
    /// the provider accepted it is not the same as a run the operator cancelled.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Stack(StackError::Failed { .. }) => EXIT_STACK_FAILED,
            Self::Stack(StackError::Declined { .. }) => EXIT_DECLINED,
            Self::Stack(StackError::WaitTimeout { .. }) => EXIT_WAIT_TIMEOUT,
            _ => EXIT_FAILURE,
        }
    }

    /// Returns true if the operator chose to stop the run.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Stack(StackError::Declined { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a missing-value error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }
}

impl UploadError {
    /// Creates a put error.
    #[must_use]
    pub fn put(bucket: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl StackError {
    /// Creates a generic API error.
    #[must_use]
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            operation,
            message: message.into(),
        }
    }
}

impl LockError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}
