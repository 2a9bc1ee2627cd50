//! Stack status classification.
//!
//! The provider reports dozens of lifecycle states. Deployment logic only
//! cares whether the stack is still moving, settled successfully, or settled
//! in failure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Collapsed view of a provider stack status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackPhase {
    /// An operation is still running.
    Pending,
    /// The last operation completed successfully.
    Succeeded,
    /// The last operation failed or was rolled back.
    Failed,
}

impl StackPhase {
    /// Classifies a provider status string.
    ///
    /// Total over all strings: `*_FAILED` or anything mentioning `ROLLBACK` is
    /// a failure, any other `*_COMPLETE` is a success, the rest is pending.
    #[must_use]
    pub fn classify(status: &str) -> Self {
        if status.ends_with("_FAILED") || status.contains("ROLLBACK") {
            Self::Failed
        } else if status.ends_with("_COMPLETE") {
            Self::Succeeded
        } else {
            Self::Pending
        }
    }

    /// Returns true once no further automatic transition will happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for StackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Returns true while the provider is still working on the stack.
#[must_use]
pub fn is_in_progress(status: &str) -> bool {
    status.ends_with("_IN_PROGRESS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success() {
        assert_eq!(StackPhase::classify("CREATE_COMPLETE"), StackPhase::Succeeded);
        assert_eq!(StackPhase::classify("UPDATE_COMPLETE"), StackPhase::Succeeded);
        assert_eq!(StackPhase::classify("IMPORT_COMPLETE"), StackPhase::Succeeded);
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(StackPhase::classify("CREATE_FAILED"), StackPhase::Failed);
        assert_eq!(StackPhase::classify("ROLLBACK_COMPLETE"), StackPhase::Failed);
        assert_eq!(StackPhase::classify("UPDATE_ROLLBACK_COMPLETE"), StackPhase::Failed);
        assert_eq!(StackPhase::classify("UPDATE_ROLLBACK_FAILED"), StackPhase::Failed);
        assert_eq!(StackPhase::classify("ROLLBACK_IN_PROGRESS"), StackPhase::Failed);
        assert_eq!(StackPhase::classify("DELETE_FAILED"), StackPhase::Failed);
    }

    #[test]
    fn test_classify_pending() {
        assert_eq!(StackPhase::classify("CREATE_IN_PROGRESS"), StackPhase::Pending);
        assert_eq!(
            StackPhase::classify("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"),
            StackPhase::Pending
        );
        assert_eq!(StackPhase::classify("REVIEW_IN_PROGRESS"), StackPhase::Pending);
        assert_eq!(StackPhase::classify(""), StackPhase::Pending);
        assert_eq!(StackPhase::classify("something unexpected"), StackPhase::Pending);
    }

    #[test]
    fn test_classification_is_idempotent() {
        for status in ["CREATE_COMPLETE", "UPDATE_ROLLBACK_COMPLETE", "UPDATE_IN_PROGRESS"] {
            let first = StackPhase::classify(status);
            assert_eq!(first, StackPhase::classify(status));
            assert_eq!(first.is_terminal(), first != StackPhase::Pending);
        }
    }

    #[test]
    fn test_in_progress() {
        assert!(is_in_progress("UPDATE_IN_PROGRESS"));
        assert!(is_in_progress("UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"));
        assert!(!is_in_progress("UPDATE_COMPLETE"));
    }
}
