//! Configuration specification types for the deployment system.
//!
//! These structs map to `stackship.yaml`. Every component receives the part
//! of this configuration it needs through its constructor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::routes::RouteSpec;

/// The root configuration structure for a stackship deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShipConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Stack configuration.
    #[serde(default)]
    pub stack: StackConfig,
    /// Artifact storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Code package configuration.
    #[serde(default)]
    pub code: CodeConfig,
    /// Static asset configuration.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Pre-warming configuration.
    #[serde(default)]
    pub prewarm: PrewarmConfig,
    /// Stack status polling configuration.
    #[serde(default)]
    pub waiter: WaiterConfig,
    /// Inline route table.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// External route table file, appended after the inline routes.
    #[serde(default)]
    pub routes_file: Option<PathBuf>,
    /// What to do when two routes synthesize the same logical id.
    #[serde(default)]
    pub route_collisions: CollisionPolicy,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,
    /// Environment (e.g., "development", "staging", "production").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Extra suffix to deploy several copies of one environment.
    #[serde(default)]
    pub env_extra: Option<String>,
}

/// Stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackConfig {
    /// Stack name (defaults to the project namespace).
    #[serde(default)]
    pub name: Option<String>,
    /// Path to the parent template (defaults to `<template_dir>/<namespace>.yml`).
    #[serde(default)]
    pub template: Option<PathBuf>,
    /// Directory holding the generated child templates.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Capabilities acknowledged up front.
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Artifact storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// S3 bucket receiving templates, code and assets.
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
    /// Key namespace segment prepended to every object key.
    #[serde(default = "default_key_prefix")]
    pub prefix: String,
}

/// Code package configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeConfig {
    /// Path to the code archive.
    #[serde(default = "default_code_package")]
    pub package: PathBuf,
}

/// Static asset configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetsConfig {
    /// Directory containing the asset folders.
    #[serde(default = "default_asset_root")]
    pub root: PathBuf,
    /// Folders under `root` whose files are uploaded.
    #[serde(default = "default_asset_folders")]
    pub folders: Vec<String>,
    /// Max age in seconds used to build the cache-control header.
    #[serde(default = "default_max_age")]
    pub max_age: u64,
    /// Explicit cache-control header; takes precedence over `max_age`.
    #[serde(default)]
    pub cache_control: Option<String>,
    /// Number of files uploaded concurrently in one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Pre-warming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrewarmConfig {
    /// Whether to warm the deployed routes after a full deploy.
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Number of routes warmed at the same time.
    #[serde(default = "default_prewarm_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_prewarm_timeout")]
    pub timeout_secs: u64,
    /// Base URL to warm when no endpoint is discovered (e.g. a custom domain).
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Stack status polling configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaiterConfig {
    /// Seconds between two polls.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Seconds before polling gives up.
    #[serde(default = "default_wait_timeout")]
    pub timeout_secs: u64,
}

/// Policy applied when two routes synthesize the same logical id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Fail the synthesis.
    #[default]
    Reject,
    /// Keep the last definition, as older templates did.
    Overwrite,
}

// Default value functions

const fn default_true() -> bool {
    true
}

const fn default_max_age() -> u64 {
    3600
}

const fn default_batch_size() -> usize {
    10
}

const fn default_prewarm_concurrency() -> usize {
    2
}

const fn default_prewarm_timeout() -> u64 {
    10
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_wait_timeout() -> u64 {
    3600
}

fn default_environment() -> String {
    String::from("development")
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("build/templates")
}

fn default_key_prefix() -> String {
    String::from("stackship")
}

fn default_code_package() -> PathBuf {
    PathBuf::from("build/code/code.zip")
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("public")
}

fn default_asset_folders() -> Vec<String> {
    vec![
        String::from("packs"),
        String::from("images"),
        String::from("assets"),
    ]
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: None,
            template: None,
            template_dir: default_template_dir(),
            capabilities: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            prefix: default_key_prefix(),
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            package: default_code_package(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_asset_root(),
            folders: default_asset_folders(),
            max_age: default_max_age(),
            cache_control: None,
            batch_size: default_batch_size(),
        }
    }
}

impl Default for PrewarmConfig {
    fn default() -> Self {
        Self {
            enable: true,
            concurrency: default_prewarm_concurrency(),
            timeout_secs: default_prewarm_timeout(),
            base_url: None,
        }
    }
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            timeout_secs: default_wait_timeout(),
        }
    }
}

impl ProjectConfig {
    /// Returns the short environment name used in stack names.
    #[must_use]
    pub fn short_env(&self) -> &str {
        match self.environment.as_str() {
            "development" => "dev",
            "production" => "prod",
            "staging" => "stag",
            other => other,
        }
    }

    /// Returns the namespace shared by the stack and its child templates.
    ///
    /// Example: `demo-dev`, or `demo-dev-2` with `env_extra: "2"`.
    #[must_use]
    pub fn namespace(&self) -> String {
        let mut parts = vec![self.name.as_str(), self.short_env()];
        if let Some(extra) = self.env_extra.as_deref().filter(|e| !e.is_empty()) {
            parts.push(extra);
        }
        parts.join("-")
    }
}

impl ShipConfig {
    /// Returns the name of the parent stack.
    #[must_use]
    pub fn stack_name(&self) -> String {
        self.stack
            .name
            .clone()
            .unwrap_or_else(|| self.project.namespace())
    }

    /// Returns the path of the parent template.
    #[must_use]
    pub fn parent_template_path(&self) -> PathBuf {
        self.stack.template.clone().unwrap_or_else(|| {
            self.stack
                .template_dir
                .join(format!("{}.yml", self.project.namespace()))
        })
    }

    /// Returns the file-name prefix shared by child templates.
    #[must_use]
    pub fn child_template_prefix(&self) -> String {
        format!("{}-", self.project.namespace())
    }

    /// Returns the cache-control header applied to static assets.
    ///
    /// An explicit `cache_control` wins; otherwise one is built from `max_age`.
    #[must_use]
    pub fn asset_cache_control(&self) -> String {
        self.assets
            .cache_control
            .clone()
            .unwrap_or_else(|| format!("public, max-age={}", self.assets.max_age))
    }

    /// Resolves every relative path in the configuration against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        resolve(&mut self.stack.template_dir);
        if let Some(template) = self.stack.template.as_mut() {
            resolve(template);
        }
        resolve(&mut self.code.package);
        resolve(&mut self.assets.root);
        if let Some(routes_file) = self.routes_file.as_mut() {
            resolve(routes_file);
        }
    }
}
