//! Route table and API method synthesis.
//!
//! Routes come from the application; this module turns each one into a
//! deterministic API method resource for the stack template.

mod method;
mod route;
mod table;

pub use method::{
    method_logical_id, sanitize_path, ApiMethod, FunctionPermission, LogicalIdSynthesizer,
    PermissionProvider, ResourceDefinition, API_METHOD_TYPE, METHOD_ID_SUFFIX,
    NAMESPACE_PLACEHOLDER, ROOT_PATH_TOKEN,
};
pub use route::{camelize, underscore, HttpMethod, Route, RouteSpec};
pub use table::{RouteTable, SynthesizedMethods};
