//! API method resources synthesized from routes.
//!
//! Every route becomes one `AWS::ApiGateway::Method` resource. Its logical id
//! is derived from the route path alone, so the same route always yields the
//! same id and two paths bound to one controller action still get two ids.
//!
//! The integration block points at the backing function through a
//! `{namespace}` placeholder. Filling that placeholder in is the job of the
//! template assembler; [`ApiMethod::replacements`] exposes the value to use.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use super::route::{camelize, underscore, Route};

/// Suffix appended to every API method logical id.
pub const METHOD_ID_SUFFIX: &str = "api_method";

/// Suffix appended to the CORS companion's logical id.
pub const CORS_ID_SUFFIX: &str = "cors_api_method";

/// Token standing in for the empty root path.
pub const ROOT_PATH_TOKEN: &str = "homepage";

/// Placeholder replaced with the backing function's namespace at assembly time.
pub const NAMESPACE_PLACEHOLDER: &str = "{namespace}";

/// Resource type of an API method.
pub const API_METHOD_TYPE: &str = "AWS::ApiGateway::Method";

/// Resource type of a function invoke permission.
pub const FUNCTION_PERMISSION_TYPE: &str = "AWS::Lambda::Permission";

/// A declarative resource definition destined for a stack template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Template-local unique name.
    pub logical_id: String,
    /// Resource kind, e.g. `AWS::ApiGateway::Method`.
    pub resource_type: String,
    /// Opaque properties passed through to template assembly.
    pub properties: Value,
}

impl ResourceDefinition {
    /// Returns the `{ logicalId: { Type, Properties } }` template entry.
    #[must_use]
    pub fn to_template_entry(&self) -> Value {
        json!({
            &self.logical_id: {
                "Type": self.resource_type,
                "Properties": self.properties,
            }
        })
    }
}

/// Something that can grant the API permission to invoke a route's target.
///
/// Injected into [`ApiMethod`] so the permission resource can come from the
/// function, a shared authorizer, or a test double.
pub trait PermissionProvider: Send + Sync + fmt::Debug {
    /// Returns the permission resource definition.
    fn permission(&self) -> ResourceDefinition;
}

/// Default permission: lets the REST API invoke the route's function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPermission {
    /// Namespace of the function, e.g. `PostsControllerShow`.
    namespace: String,
}

impl FunctionPermission {
    /// Creates the permission for the function serving `route`.
    #[must_use]
    pub fn for_route(route: &Route) -> Self {
        Self {
            namespace: function_namespace(route),
        }
    }
}

impl PermissionProvider for FunctionPermission {
    fn permission(&self) -> ResourceDefinition {
        ResourceDefinition {
            logical_id: format!("{}_api_permission", underscore(&self.namespace)),
            resource_type: String::from(FUNCTION_PERMISSION_TYPE),
            properties: json!({
                "FunctionName": { "Fn::GetAtt": [format!("{}LambdaFunction", self.namespace), "Arn"] },
                "Action": "lambda:InvokeFunction",
                "Principal": "apigateway.amazonaws.com",
                "SourceArn": { "Fn::Sub": "arn:aws:execute-api:${AWS::Region}:${AWS::AccountId}:${RestApi}/*/*" },
            }),
        }
    }
}

/// An API method resource bound to one route.
#[derive(Debug)]
pub struct ApiMethod {
    /// Source route.
    route: Route,
    /// Logical id, computed once at construction.
    logical_id: String,
    /// Permission capability.
    permission: Box<dyn PermissionProvider>,
    /// CORS companion, built on first use.
    cors: OnceLock<ResourceDefinition>,
}

impl ApiMethod {
    /// Creates the method for `route` with the default function permission.
    #[must_use]
    pub fn new(route: Route) -> Self {
        let permission = Box::new(FunctionPermission::for_route(&route));
        Self {
            logical_id: method_logical_id(&route),
            route,
            permission,
            cors: OnceLock::new(),
        }
    }

    /// Replaces the permission provider.
    #[must_use]
    pub fn with_permission_provider(mut self, provider: Box<dyn PermissionProvider>) -> Self {
        self.permission = provider;
        self
    }

    /// Returns the source route.
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }

    /// Returns the logical id.
    #[must_use]
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Returns the method resource definition.
    #[must_use]
    pub fn definition(&self) -> ResourceDefinition {
        ResourceDefinition {
            logical_id: self.logical_id.clone(),
            resource_type: String::from(API_METHOD_TYPE),
            properties: json!({
                "ResourceId": self.parent_resource_ref(),
                "RestApiId": { "Ref": "RestApi" },
                "HttpMethod": self.route.http_method.as_str(),
                "RequestParameters": {},
                "AuthorizationType": "NONE",
                "Integration": {
                    "IntegrationHttpMethod": "POST",
                    "Type": "AWS_PROXY",
                    "Uri": {
                        "Fn::Sub": format!(
                            "arn:aws:apigateway:${{AWS::Region}}:lambda:path/2015-03-31/functions/${{{NAMESPACE_PLACEHOLDER}LambdaFunction.Arn}}/invocations"
                        ),
                    },
                },
                "MethodResponses": [],
            }),
        }
    }

    /// Returns the permission resource, delegated to the injected provider.
    #[must_use]
    pub fn permission(&self) -> ResourceDefinition {
        self.permission.permission()
    }

    /// Returns the `OPTIONS` mock method answering CORS preflight requests.
    pub fn cors(&self) -> &ResourceDefinition {
        self.cors.get_or_init(|| ResourceDefinition {
            logical_id: format!("{}_{CORS_ID_SUFFIX}", path_token(&self.route.path)),
            resource_type: String::from(API_METHOD_TYPE),
            properties: json!({
                "ResourceId": self.parent_resource_ref(),
                "RestApiId": { "Ref": "RestApi" },
                "HttpMethod": "OPTIONS",
                "AuthorizationType": "NONE",
                "Integration": {
                    "Type": "MOCK",
                    "RequestTemplates": { "application/json": "{\"statusCode\": 200}" },
                    "IntegrationResponses": [{
                        "StatusCode": "204",
                        "ResponseParameters": {
                            "method.response.header.Access-Control-Allow-Headers": "'Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token'",
                            "method.response.header.Access-Control-Allow-Methods": "'OPTIONS,GET,PUT,POST,DELETE,PATCH,HEAD'",
                            "method.response.header.Access-Control-Allow-Origin": "'*'",
                        },
                    }],
                },
                "MethodResponses": [{
                    "StatusCode": "204",
                    "ResponseParameters": {
                        "method.response.header.Access-Control-Allow-Headers": false,
                        "method.response.header.Access-Control-Allow-Methods": false,
                        "method.response.header.Access-Control-Allow-Origin": false,
                    },
                }],
            }),
        })
    }

    /// Returns the placeholder values the template assembler substitutes.
    #[must_use]
    pub fn replacements(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(String::from("namespace"), function_namespace(&self.route))])
    }

    /// Returns the logical id of the parent routing resource.
    ///
    /// Example: `posts/:id` lives under `PostsIdApiResource`; the root route
    /// lives directly under the API's root resource.
    #[must_use]
    pub fn parent_resource_id(&self) -> String {
        if self.route.is_root() {
            return String::from("RootResourceId");
        }

        let cleaned: String = self
            .route
            .path
            .trim_matches('/')
            .chars()
            .filter(|c| *c != ':' && *c != '*')
            .map(|c| if c == '/' || c == '-' { '_' } else { c })
            .collect();
        format!("{}ApiResource", camelize(&cleaned))
    }

    fn parent_resource_ref(&self) -> Value {
        if self.route.is_root() {
            json!({ "Fn::GetAtt": ["RestApi", "RootResourceId"] })
        } else {
            json!({ "Ref": self.parent_resource_id() })
        }
    }
}

/// Synthesizes logical ids and method definitions from routes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogicalIdSynthesizer;

impl LogicalIdSynthesizer {
    /// Creates a new synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the logical id and method definition for `route`.
    ///
    /// Total and deterministic: the same route yields the same output on
    /// every call and every run.
    #[must_use]
    pub fn synthesize(&self, route: &Route) -> (String, ResourceDefinition) {
        let method = ApiMethod::new(route.clone());
        (method.logical_id().to_string(), method.definition())
    }
}

/// Reduces a route path to `[A-Za-z0-9_]` form.
///
/// Wildcard markers are dropped, every run of other non-alphanumeric
/// characters becomes one underscore, and edge underscores are trimmed.
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut pending_separator = false;

    for c in path.chars().filter(|c| *c != '*') {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Returns the logical id of the method resource for `route`.
#[must_use]
pub fn method_logical_id(route: &Route) -> String {
    format!("{}_{METHOD_ID_SUFFIX}", path_token(&route.path))
}

fn path_token(path: &str) -> String {
    let sanitized = sanitize_path(path);
    if sanitized.is_empty() {
        String::from(ROOT_PATH_TOKEN)
    } else {
        sanitized
    }
}

/// Returns the camelized `<controller><action>` namespace of a route's function.
fn function_namespace(route: &Route) -> String {
    let controller = underscore(&route.controller_name).replace('/', "_");
    camelize(&format!("{controller}_{}", route.action_name))
}
