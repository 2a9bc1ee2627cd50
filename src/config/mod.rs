//! Configuration module for stackship.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stackship.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod spec;
mod parser;
mod validator;

pub use spec::{
    AssetsConfig, CodeConfig, CollisionPolicy, PrewarmConfig, ProjectConfig, ShipConfig,
    StackConfig, StorageConfig, WaiterConfig,
};
pub use parser::{ConfigParser, find_config_file, DEFAULT_CONFIG_FILES};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, KNOWN_CAPABILITIES};
