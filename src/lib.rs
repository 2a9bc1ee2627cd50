// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackship
//!
//! A route-driven deployment orchestrator for CloudFormation stacks.
//!
//! ## Overview
//!
//! Stackship takes an application's route table and a pre-rendered parent
//! template and drives a deployment to completion:
//!
//! - Synthesize one API method resource per route, with a stable logical id
//! - Upload child templates, the code package and static assets to S3
//! - Create or update the stack, escalating capabilities with consent
//! - Poll the stack until it settles, then discover and pre-warm the endpoint
//!
//! ## Architecture
//!
//! 1. **Routes**: `routes` turns route specs into method resources
//! 2. **Upload**: `upload` ships artifacts in ordered phases
//! 3. **Stack**: `stack` wraps the provider API and the status poller
//! 4. **Deployer**: `deployer` sequences the whole run
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`routes`]: Route table and logical id synthesis
//! - [`upload`]: Artifact discovery and upload
//! - [`stack`]: Stack API, status classification and polling
//! - [`deployer`]: Deployment orchestration
//! - [`lock`]: Deployment lock stored next to the artifacts
//! - [`prewarm`]: Post-deploy route warming
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: blog
//!   environment: production
//!
//! storage:
//!   bucket: my-artifacts
//!   prefix: stackship
//!
//! routes:
//!   - method: GET
//!     path: ""
//!     to: "home#index"
//!   - method: GET
//!     path: "posts/:id"
//!     to: "posts#show"
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployer;
pub mod error;
pub mod lock;
pub mod prewarm;
pub mod routes;
pub mod stack;
pub mod upload;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ShipConfig};
pub use deployer::{DeployOutcome, DeploymentOrchestrator, DeploymentRequest, StackKind};
pub use error::{Result, ShipError};
pub use lock::{DeployLock, LockInfo};
pub use prewarm::{HttpPrewarmer, PrewarmReport, Prewarmer};
pub use routes::{LogicalIdSynthesizer, Route, RouteTable};
pub use stack::{CloudFormationClient, StackApi, StackPhase, StackStatusWaiter};
pub use upload::{ArtifactSet, ArtifactUploader, ObjectStore, S3ObjectStore};
