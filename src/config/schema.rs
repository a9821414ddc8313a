//! Configuration schema definitions.
//!
//! This module defines the configuration structure for a router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::routing::{PatternError, Route, RouteBuilder};

/// Root configuration for a router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Transition settings.
    pub transitions: TransitionConfig,

    /// Matching settings.
    pub matching: MatchingConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Static route tree.
    pub routes: Vec<RouteConfig>,
}

impl RouterConfig {
    /// Build the configured route tree.
    pub fn build_routes(&self) -> Result<Vec<Arc<Route>>, PatternError> {
        self.routes
            .iter()
            .map(|route| route.to_builder().build())
            .collect()
    }
}

/// Transition configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Longest chain of hook redirects before giving up.
    pub max_redirects: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { max_redirects: 16 }
    }
}

/// Matching configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Percent-decode captured param values.
    pub decode_params: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            decode_params: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A route entry. Nested through `children` and `index`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouteConfig {
    /// Route identifier for logging and lookups.
    pub name: Option<String>,

    /// Path pattern; absent for path-less routes.
    pub path: Option<String>,

    /// Single component.
    pub component: Option<String>,

    /// Named component slots.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, String>,

    /// Index route used when this route consumes the whole path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<Box<RouteConfig>>,

    /// Nested routes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteConfig>,
}

impl RouteConfig {
    /// Translate into a route builder.
    pub fn to_builder(&self) -> RouteBuilder {
        let mut builder = Route::builder();
        if let Some(name) = &self.name {
            builder = builder.name(name.as_str());
        }
        if let Some(path) = &self.path {
            builder = builder.path(path.as_str());
        }
        if let Some(component) = &self.component {
            builder = builder.component(component.as_str());
        } else if !self.components.is_empty() {
            builder = builder.components(self.components.clone());
        }
        if let Some(index) = &self.index {
            builder = builder.index(index.to_builder());
        }
        builder.children(self.children.iter().map(RouteConfig::to_builder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Components;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.transitions.max_redirects, 16);
        assert!(config.matching.decode_params);
        assert_eq!(config.logging.level, "info");
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_build_routes() {
        let config: RouterConfig = toml::from_str(
            r#"
            [[routes]]
            name = "app"
            path = "/"
            component = "App"

            [routes.index]
            component = "Home"

            [[routes.children]]
            name = "inbox"
            path = "inbox"
            components = { main = "Inbox", sidebar = "Folders" }
            "#,
        )
        .unwrap();

        let routes = config.build_routes().unwrap();
        assert_eq!(routes.len(), 1);
        let app = &routes[0];
        assert_eq!(app.name(), Some("app"));
        assert!(app.loaded_index_route().is_some());

        let inbox = &app.loaded_children().unwrap()[0];
        match inbox.loaded_components() {
            Some(Components::Named(slots)) => {
                assert_eq!(slots.get("sidebar").map(|c| c.as_str()), Some("Folders"));
            }
            other => panic!("unexpected components: {:?}", other),
        }
    }
}
