//! Route table loading and bulk synthesis.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{CollisionPolicy, ShipConfig};
use crate::error::{ConfigError, Result, RouteError, ShipError};

use super::method::{ApiMethod, ResourceDefinition};
use super::route::{Route, RouteSpec};

/// The application's routes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

/// Method resources synthesized from a route table.
#[derive(Debug, Clone, Default)]
pub struct SynthesizedMethods {
    /// Definitions in first-declaration order.
    pub definitions: Vec<ResourceDefinition>,
    /// Placeholder values per logical id.
    pub replacements: HashMap<String, std::collections::BTreeMap<String, String>>,
}

impl RouteTable {
    /// Creates a table from routes.
    #[must_use]
    pub const fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Builds the table from the inline routes and the routes file.
    ///
    /// # Errors
    ///
    /// Returns an error if the routes file cannot be read or a route is invalid.
    pub fn from_config(config: &ShipConfig) -> Result<Self> {
        let mut specs = config.routes.clone();

        if let Some(path) = &config.routes_file {
            specs.extend(load_route_specs(path)?);
        }

        let routes = specs
            .iter()
            .map(Route::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Loaded {} routes", routes.len());
        Ok(Self { routes })
    }

    /// Returns the routes.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if the table has no routes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Synthesizes one method resource per route.
    ///
    /// Two routes whose paths sanitize to the same string share a logical id.
    /// With [`CollisionPolicy::Reject`] that is an error; with
    /// [`CollisionPolicy::Overwrite`] the later route replaces the earlier one
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::DuplicateLogicalId`] on a rejected collision.
    pub fn synthesize_all(&self, policy: CollisionPolicy) -> Result<SynthesizedMethods> {
        let mut out = SynthesizedMethods::default();
        let mut owners: HashMap<String, (usize, &Route)> = HashMap::new();

        for route in &self.routes {
            let method = ApiMethod::new(route.clone());
            let logical_id = method.logical_id().to_string();

            if let Some((slot, owner)) = owners.get(&logical_id).copied() {
                match policy {
                    CollisionPolicy::Reject => {
                        return Err(ShipError::Route(RouteError::DuplicateLogicalId {
                            logical_id,
                            first: owner.to_string(),
                            second: route.to_string(),
                        }));
                    }
                    CollisionPolicy::Overwrite => {
                        warn!("Route '{route}' overwrites '{owner}' ({logical_id})");
                        out.definitions[slot] = method.definition();
                        out.replacements.insert(logical_id.clone(), method.replacements());
                        owners.insert(logical_id, (slot, route));
                        continue;
                    }
                }
            }

            owners.insert(logical_id.clone(), (out.definitions.len(), route));
            out.definitions.push(method.definition());
            out.replacements.insert(logical_id, method.replacements());
        }

        info!("Synthesized {} API method resources", out.definitions.len());
        Ok(out)
    }
}

impl SynthesizedMethods {
    /// Returns the definitions as one `Resources` mapping.
    #[must_use]
    pub fn template_fragment(&self) -> Value {
        let mut resources = Map::new();
        for definition in &self.definitions {
            if let Value::Object(entry) = definition.to_template_entry() {
                resources.extend(entry);
            }
        }
        Value::Object(resources)
    }
}

/// Reads a YAML list of route specs.
fn load_route_specs(path: &Path) -> Result<Vec<RouteSpec>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ShipError::Config(ConfigError::ParseError {
            message: format!("Failed to read routes file: {e}"),
            location: Some(path.display().to_string()),
        })
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        ShipError::Config(ConfigError::ParseError {
            message: format!("Routes file parse error: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}
