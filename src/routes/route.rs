//! Route types.
//!
//! A route binds an HTTP method and path to a controller action. Routes are
//! supplied by the application; this module only models and parses them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RouteError;

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
    /// HEAD.
    Head,
    /// OPTIONS.
    Options,
    /// Any method.
    Any,
}

impl HttpMethod {
    /// Returns the method as the provider spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "ANY",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "ANY" => Ok(Self::Any),
            _ => Err(RouteError::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route bound to a controller action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// HTTP method.
    pub http_method: HttpMethod,
    /// Path, possibly with `:param` placeholders and `*wildcard` segments.
    pub path: String,
    /// Controller class name, e.g. `PostsController`.
    pub controller_name: String,
    /// Action name, e.g. `show`.
    pub action_name: String,
}

impl Route {
    /// Creates a new route.
    #[must_use]
    pub fn new(
        http_method: HttpMethod,
        path: impl Into<String>,
        controller_name: impl Into<String>,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            http_method,
            path: path.into(),
            controller_name: controller_name.into(),
            action_name: action_name.into(),
        }
    }

    /// Returns true for the root route.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.trim_matches('/').is_empty()
    }

    /// Returns true if the path has a `:param` placeholder or a wildcard.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.path.contains(':') || self.path.contains('*')
    }

    /// Returns true if this route can be requested as-is with a plain GET.
    #[must_use]
    pub fn is_static_get(&self) -> bool {
        matches!(self.http_method, HttpMethod::Get | HttpMethod::Any) && !self.is_dynamic()
    }

    /// Returns the path with exactly one leading slash.
    #[must_use]
    pub fn display_path(&self) -> String {
        format!("/{}", self.path.trim_start_matches('/'))
    }

    /// Returns the `Controller#action` target.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}#{}", self.controller_name, self.action_name)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.http_method, self.display_path(), self.target())
    }
}

/// A route as written in configuration: `{ method, path, to: "posts#show" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// HTTP method name.
    pub method: String,
    /// Route path.
    #[serde(default)]
    pub path: String,
    /// `controller#action` target.
    pub to: String,
}

impl TryFrom<&RouteSpec> for Route {
    type Error = RouteError;

    fn try_from(spec: &RouteSpec) -> Result<Self, Self::Error> {
        let http_method = spec.method.parse()?;

        let invalid = || RouteError::InvalidTarget {
            target: spec.to.clone(),
        };
        let (controller, action) = spec.to.split_once('#').ok_or_else(invalid)?;
        if controller.is_empty() || action.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(
            http_method,
            spec.path.clone(),
            format!("{}Controller", camelize(controller)),
            action,
        ))
    }
}

/// Converts `snake_case/segments` to `CamelCase::Segments`.
///
/// Example: `jets/public_assets` becomes `Jets::PublicAssets`.
#[must_use]
pub fn camelize(input: &str) -> String {
    input
        .split('/')
        .map(|segment| {
            segment
                .split('_')
                .filter(|word| !word.is_empty())
                .map(|word| {
                    let mut chars = word.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().chain(chars).collect()
                    })
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// Converts `CamelCase::Segments` to `camel_case/segments`.
#[must_use]
pub fn underscore(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev_lower = false;

    for segment in input.split("::") {
        if !out.is_empty() {
            out.push('/');
            prev_lower = false;
        }
        for c in segment.chars() {
            if c.is_ascii_uppercase() {
                if prev_lower {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
                prev_lower = false;
            } else {
                out.push(c);
                prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            }
        }
    }

    out
}
