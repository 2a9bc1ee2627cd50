//! Deployment request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::ShipConfig;
use crate::error::{ConfigError, Result};

/// How much of the application a deployment ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    /// Everything: artifacts are uploaded and post-deploy actions run.
    Full,
    /// Only the minimal parent stack; no artifact store is involved.
    PartialCodeOnly,
}

impl StackKind {
    /// Returns true if artifacts and post-deploy actions are involved.
    #[must_use]
    pub const fn is_full(self) -> bool {
        matches!(self, Self::Full)
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::PartialCodeOnly => write!(f, "minimal"),
        }
    }
}

/// One deployment of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Target stack.
    pub stack_name: String,
    /// Parent template body.
    pub template_body: String,
    /// Capabilities acknowledged up front.
    pub capabilities: BTreeSet<String>,
    /// Full or partial deploy.
    pub stack_kind: StackKind,
}

impl DeploymentRequest {
    /// Creates a request without capabilities.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        template_body: impl Into<String>,
        stack_kind: StackKind,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            template_body: template_body.into(),
            capabilities: BTreeSet::new(),
            stack_kind,
        }
    }

    /// Adds acknowledged capabilities.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Builds the request from configuration, reading the parent template.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent template cannot be read.
    pub fn from_config(config: &ShipConfig, stack_kind: StackKind) -> Result<Self> {
        let path = config.parent_template_path();
        if !path.is_file() {
            return Err(ConfigError::FileNotFound { path }.into());
        }
        let template_body = std::fs::read_to_string(&path)?;

        Ok(Self::new(config.stack_name(), template_body, stack_kind)
            .with_capabilities(config.stack.capabilities.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    #[test]
    fn test_capabilities_are_deduplicated() {
        let request = DeploymentRequest::new("demo-dev", "{}", StackKind::Full)
            .with_capabilities(["CAPABILITY_IAM", "CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"]);
        assert_eq!(request.capabilities.len(), 2);
    }

    #[test]
    fn test_from_config_reads_parent_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("build/templates")).unwrap();
        std::fs::write(dir.path().join("build/templates/demo-dev.yml"), "Resources: {}\n").unwrap();

        let config = ConfigParser::new()
            .with_base_path(dir.path())
            .parse_yaml(
                "project:\n  name: demo\nstack:\n  capabilities: [CAPABILITY_IAM]\n",
                None,
            )
            .unwrap();

        let request = DeploymentRequest::from_config(&config, StackKind::PartialCodeOnly).unwrap();
        assert_eq!(request.stack_name, "demo-dev");
        assert_eq!(request.template_body, "Resources: {}\n");
        assert!(request.capabilities.contains("CAPABILITY_IAM"));
        assert!(!request.stack_kind.is_full());
    }

    #[test]
    fn test_from_config_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigParser::new()
            .with_base_path(dir.path())
            .parse_yaml("project:\n  name: demo\n", None)
            .unwrap();

        let err = DeploymentRequest::from_config(&config, StackKind::Full).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShipError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
