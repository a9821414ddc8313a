//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every path pattern compiles
//! - Reject ambiguous route entries (both `component` and `components`, pathed index routes)
//! - Detect duplicate route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{RouteConfig, RouterConfig};
use crate::routing::PathPattern;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem, located by its dotted field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transitions.max_redirects == 0 {
        errors.push(ValidationError::new(
            "transitions.max_redirects",
            "must be at least 1",
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level `{}`", config.logging.level),
        ));
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::new("routes", "at least one route is required"));
    }

    let mut names = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        validate_route(route, &format!("routes[{}]", i), &mut names, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route<'a>(
    route: &'a RouteConfig,
    field: &str,
    names: &mut HashSet<&'a str>,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(path) = &route.path {
        if let Err(err) = PathPattern::compile(path) {
            errors.push(ValidationError::new(format!("{}.path", field), err.to_string()));
        }
    }

    if route.component.is_some() && !route.components.is_empty() {
        errors.push(ValidationError::new(
            field,
            "`component` and `components` are mutually exclusive",
        ));
    }

    if let Some(name) = &route.name {
        if !names.insert(name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate route name `{}`", name),
            ));
        }
    }

    if let Some(index) = &route.index {
        let index_field = format!("{}.index", field);
        if index.path.is_some() {
            errors.push(ValidationError::new(
                &index_field,
                "index routes cannot have a path",
            ));
        }
        validate_route(index, &index_field, names, errors);
    }

    for (i, child) in route.children.iter().enumerate() {
        validate_route(child, &format!("{}.children[{}]", field, i), names, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> RouteConfig {
        RouteConfig {
            path: Some(path.to_string()),
            ..RouteConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = RouterConfig {
            routes: vec![route("/")],
            ..RouterConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut root = route("/");
        root.name = Some("dup".into());
        root.component = Some("App".into());
        root.components.insert("main".into(), "Main".into());

        let mut child = route("users/(:id");
        child.name = Some("dup".into());
        root.children.push(child);
        root.index = Some(Box::new(route("home")));

        let mut config = RouterConfig {
            routes: vec![root],
            ..RouterConfig::default()
        };
        config.transitions.max_redirects = 0;
        config.logging.level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "transitions.max_redirects",
                "logging.level",
                "routes[0]",
                "routes[0].index",
                "routes[0].children[0].path",
                "routes[0].children[0].name",
            ]
        );
    }

    #[test]
    fn test_routes_required() {
        let errors = validate_config(&RouterConfig::default()).unwrap_err();
        assert_eq!(errors[0].to_string(), "routes: at least one route is required");
    }
}
