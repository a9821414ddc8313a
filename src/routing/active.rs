//! Active-link checks against the current branch.

use std::sync::Arc;

use crate::history::{Location, LocationDescriptor};
use crate::routing::route::Route;
use crate::routing::Params;

/// True when `candidate` is active for the current location and branch.
///
/// The pathname is active when it equals the current one (ignoring a trailing
/// slash) or, unless `index_only`, when it matches an ancestor route of the
/// current branch with the same param values. Every query key of the
/// candidate must then equal the current query value.
pub fn is_active(
    candidate: &LocationDescriptor,
    index_only: bool,
    current: &Location,
    routes: &[Arc<Route>],
    params: &Params,
    decode: bool,
) -> bool {
    let pathname = if candidate.pathname.starts_with('/') {
        candidate.pathname.clone()
    } else {
        format!("/{}", candidate.pathname)
    };

    if !path_is_active(&pathname, &current.pathname)
        && (index_only || !route_is_active(&pathname, routes, params, decode))
    {
        return false;
    }

    query_is_active(candidate, current)
}

fn path_is_active(pathname: &str, current: &str) -> bool {
    with_trailing_slash(pathname) == with_trailing_slash(current)
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

fn route_is_active(pathname: &str, routes: &[Arc<Route>], params: &Params, decode: bool) -> bool {
    let mut remaining = Some(pathname.to_string());
    let mut captured: Vec<(String, Option<String>)> = Vec::new();

    for pattern in routes.iter().filter_map(|route| route.path()) {
        if pattern.is_absolute() {
            remaining = Some(pathname.to_string());
            captured.clear();
        }

        let Some(path) = remaining.take() else {
            continue;
        };
        let Some(matched) = pattern.match_path(&path, decode) else {
            continue;
        };
        let complete = matched.is_complete();
        captured.extend(matched.params);

        if complete {
            return captured
                .iter()
                .all(|(name, value)| value.as_deref() == params.get(name).map(String::as_str));
        }
        remaining = Some(matched.remaining);
    }

    false
}

fn query_is_active(candidate: &LocationDescriptor, current: &Location) -> bool {
    if candidate.search.is_empty() {
        return true;
    }
    let current = current.query();
    candidate
        .query()
        .iter()
        .all(|(key, value)| current.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Action;

    fn branch() -> Vec<Arc<Route>> {
        vec![
            Route::at("/").build().unwrap(),
            Route::at("users").build().unwrap(),
            Route::at(":id").build().unwrap(),
        ]
    }

    fn current(path: &str) -> Location {
        Location::new(LocationDescriptor::parse(path), Action::Push, "k")
    }

    fn params(id: &str) -> Params {
        Params::from([("id".to_string(), id.to_string())])
    }

    fn check(candidate: &str, index_only: bool, at: &str) -> bool {
        is_active(
            &LocationDescriptor::parse(candidate),
            index_only,
            &current(at),
            &branch(),
            &params("42"),
            true,
        )
    }

    #[test]
    fn test_exact_path_is_active() {
        assert!(check("/users/42", false, "/users/42"));
        assert!(check("/users/42/", true, "/users/42"));
        assert!(check("users/42", true, "/users/42"));
    }

    #[test]
    fn test_ancestor_is_active_unless_index_only() {
        assert!(check("/users", false, "/users/42"));
        assert!(check("/", false, "/users/42"));
        assert!(!check("/users", true, "/users/42"));
    }

    #[test]
    fn test_param_mismatch_is_inactive() {
        assert!(!check("/users/7", false, "/users/42"));
        assert!(!check("/teams", false, "/users/42"));
    }

    #[test]
    fn test_query_must_match() {
        assert!(check("/users/42?tab=posts", false, "/users/42?tab=posts&page=2"));
        assert!(!check("/users/42?tab=likes", false, "/users/42?tab=posts"));
        assert!(check("/users/42", false, "/users/42?tab=posts"));
    }
}
