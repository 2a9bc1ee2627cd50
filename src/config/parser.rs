//! Configuration parser for loading and merging configuration files.
//!
//! This module handles loading configuration from YAML files, the `.env` file
//! next to them, and environment variable overrides.

use crate::error::{ConfigError, Result, ShipError};
use std::path::Path;
use tracing::{debug, info};

use super::spec::ShipConfig;

/// Configuration parser for loading deployment configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ShipConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ShipError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ShipError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// Relative paths are resolved against the base path when one is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ShipConfig> {
        debug!("Parsing YAML configuration");

        let mut config: ShipConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ShipError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        if let Some(base) = &self.base_path {
            config.resolve_paths(base);
        }

        debug!("Successfully parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Recognized variables: `STACKSHIP_ENV`, `STACKSHIP_ENV_EXTRA`,
    /// `STACKSHIP_BUCKET`, `STACKSHIP_REGION`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ShipConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    fn apply_overrides(config: &mut ShipConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("STACKSHIP_ENV") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Some(extra) = lookup("STACKSHIP_ENV_EXTRA") {
            debug!("Overriding project.env_extra from environment");
            config.project.env_extra = Some(extra);
        }

        if let Some(bucket) = lookup("STACKSHIP_BUCKET") {
            debug!("Overriding storage.bucket from environment");
            config.storage.bucket = Some(bucket);
        }

        if let Some(region) = lookup("STACKSHIP_REGION") {
            debug!("Overriding storage.region from environment");
            config.storage.region = Some(region);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ShipError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["stackship.yaml", "stackship.yml", ".stackship.yaml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ShipError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionPolicy;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
project:
  name: demo
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.project.name, "demo");
        assert_eq!(config.project.environment, "development");
        assert_eq!(config.stack_name(), "demo-dev");
        assert_eq!(config.assets.batch_size, 10);
        assert_eq!(config.assets.max_age, 3600);
        assert_eq!(config.assets.folders, vec!["packs", "images", "assets"]);
        assert!(config.prewarm.enable);
        assert_eq!(config.route_collisions, CollisionPolicy::Reject);
    }

    #[test]
    fn test_omitted_stack_section_uses_template_dir_default() {
        let config = ConfigParser::new()
            .with_base_path("/app")
            .parse_yaml("project:\n  name: demo\n", None)
            .unwrap();

        assert_eq!(config.stack.template_dir, PathBuf::from("/app/build/templates"));
        assert_eq!(
            config.parent_template_path(),
            PathBuf::from("/app/build/templates/demo-dev.yml")
        );
        assert!(config.stack.capabilities.is_empty());
        assert!(config.prewarm.base_url.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
project:
  name: blog
  environment: production
  env_extra: "2"

stack:
  template: build/templates/blog-prod-2.yml
  capabilities:
    - CAPABILITY_IAM

storage:
  bucket: blog-artifacts
  region: us-west-2
  prefix: blog

assets:
  folders: [packs]
  cache_control: "public, max-age=60"
  batch_size: 5

prewarm:
  enable: false

waiter:
  interval_secs: 10
  timeout_secs: 600

routes:
  - { method: GET, path: "posts/:id", to: "posts#show" }
  - { method: GET, path: "", to: "home#index" }

route_collisions: overwrite
"#;
        let parser = ConfigParser::new().with_base_path("/srv/blog");
        let config = parser.parse_yaml(yaml, None).unwrap();

        assert_eq!(config.stack_name(), "blog-prod-2");
        assert_eq!(
            config.parent_template_path(),
            PathBuf::from("/srv/blog/build/templates/blog-prod-2.yml")
        );
        assert_eq!(config.storage.bucket.as_deref(), Some("blog-artifacts"));
        assert_eq!(config.assets.batch_size, 5);
        assert_eq!(config.asset_cache_control(), "public, max-age=60");
        assert!(!config.prewarm.enable);
        assert_eq!(config.waiter.interval_secs, 10);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.route_collisions, CollisionPolicy::Overwrite);
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let parser = ConfigParser::new();
        let result = parser.parse_yaml("project: [", None);
        assert!(matches!(
            result,
            Err(ShipError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let parser = ConfigParser::new();
        let mut config = parser.parse_yaml("project:\n  name: demo\n", None).unwrap();

        let vars: HashMap<&str, &str> = [
            ("STACKSHIP_ENV", "staging"),
            ("STACKSHIP_BUCKET", "override-bucket"),
        ]
        .into_iter()
        .collect();
        ConfigParser::apply_overrides(&mut config, |name| vars.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.stack_name(), "demo-stag");
        assert_eq!(config.storage.bucket.as_deref(), Some("override-bucket"));
        assert_eq!(config.storage.region, None);
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("app").join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("stackship.yaml"), "project:\n  name: demo\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("stackship.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let parser = ConfigParser::new();
        let result = parser.load_file("/definitely/not/here/stackship.yaml");
        assert!(matches!(
            result,
            Err(ShipError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
