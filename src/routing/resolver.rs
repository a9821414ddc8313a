//! Route tree resolution.
//!
//! # Responsibilities
//! - Walk the route tree depth-first to find the branch matching a location
//! - Load lazy children and index routes met along the walk
//! - Load every component of the final branch concurrently
//!
//! # Design Decisions
//! - First match in tree order wins; siblings are tried patterned first, then
//!   path-less, then catch-all, each tier in declaration order
//! - An absolute child pattern restarts from the full pathname with no params
//! - A route that did not match still searches its already-loaded children so
//!   nested absolute paths are found; lazy children are never loaded for that
//! - When everything is cached the returned future is ready on its first poll

use std::sync::Arc;
use std::time::Instant;

use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;

use crate::error::{RouterError, RouterResult};
use crate::history::Location;
use crate::observability::metrics;
use crate::routing::route::{Components, LoadContext, Route};
use crate::routing::Params;

type RawParams = Vec<(String, Option<String>)>;

/// A matched branch before components are loaded.
struct Branch {
    routes: Vec<Arc<Route>>,
    params: RawParams,
}

/// The resolved branch for one location.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Root first.
    pub routes: Vec<Arc<Route>>,
    pub params: Params,
    /// Aligned with `routes`.
    pub components: Vec<Option<Components>>,
}

/// Resolves locations against a route tree.
#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    decode_params: bool,
}

impl Default for Resolver {
    fn default() -> Self {
        Self { decode_params: true }
    }
}

impl Resolver {
    pub fn new(decode_params: bool) -> Self {
        Self { decode_params }
    }

    pub fn decode_params(&self) -> bool {
        self.decode_params
    }

    /// Find the branch for `location` and load its components.
    pub async fn resolve(
        &self,
        routes: &[Arc<Route>],
        location: &Location,
    ) -> RouterResult<MatchResult> {
        let started = Instant::now();

        let branch = self
            .match_routes(routes, location, Some(location.pathname.clone()), Vec::new())
            .await?
            .ok_or_else(|| RouterError::NotFound {
                pathname: location.pathname.clone(),
            })?;

        let params = merge_params(&branch.params);
        let context = LoadContext {
            location: location.clone(),
            params: params.clone(),
        };
        let components =
            try_join_all(branch.routes.iter().map(|route| route.resolve_components(&context)))
                .await?;

        metrics::record_match_duration(started.elapsed());
        tracing::debug!(
            pathname = %location.pathname,
            depth = branch.routes.len(),
            "Resolved route branch"
        );

        Ok(MatchResult {
            routes: branch.routes,
            params,
            components,
        })
    }

    /// Try siblings in tier order. `remaining` is `None` when only nested
    /// absolute paths can still match.
    fn match_routes<'a>(
        &'a self,
        routes: &'a [Arc<Route>],
        location: &'a Location,
        remaining: Option<String>,
        params: RawParams,
    ) -> BoxFuture<'a, RouterResult<Option<Branch>>> {
        async move {
            let mut ordered: Vec<&Arc<Route>> = routes.iter().collect();
            ordered.sort_by_key(|route| route.match_tier());

            for route in ordered {
                if let Some(branch) = self
                    .match_route(route, location, remaining.clone(), params.clone())
                    .await?
                {
                    return Ok(Some(branch));
                }
            }
            Ok(None)
        }
        .boxed()
    }

    fn match_route<'a>(
        &'a self,
        route: &'a Arc<Route>,
        location: &'a Location,
        mut remaining: Option<String>,
        mut params: RawParams,
    ) -> BoxFuture<'a, RouterResult<Option<Branch>>> {
        async move {
            if let Some(pattern) = route.path() {
                if pattern.is_absolute() {
                    remaining = Some(location.pathname.clone());
                    params.clear();
                }

                if let Some(pathname) = remaining.take() {
                    if let Some(matched) = pattern.match_path(&pathname, self.decode_params) {
                        let complete = matched.is_complete();
                        params.extend(matched.params);
                        if complete {
                            let mut routes = vec![route.clone()];
                            routes.extend(self.index_branch(route, location, &params).await?);
                            return Ok(Some(Branch { routes, params }));
                        }
                        remaining = Some(matched.remaining);
                    }
                }
            }

            let children = if remaining.is_some() {
                route
                    .resolve_children(|| load_context(location, &params))
                    .await?
            } else {
                route.loaded_children()
            };
            let Some(children) = children else {
                return Ok(None);
            };

            let branch = self
                .match_routes(children, location, remaining, params)
                .await?;
            Ok(branch.map(|mut branch| {
                branch.routes.insert(0, route.clone());
                branch
            }))
        }
        .boxed()
    }

    /// Routes appended when `route` consumed the whole path: its own index
    /// route, or the first path-less child that leads to one.
    fn index_branch<'a>(
        &'a self,
        route: &'a Arc<Route>,
        location: &'a Location,
        params: &'a RawParams,
    ) -> BoxFuture<'a, RouterResult<Vec<Arc<Route>>>> {
        async move {
            if let Some(index) = route
                .resolve_index_route(|| load_context(location, params))
                .await?
            {
                return Ok(vec![index.clone()]);
            }

            let children = route
                .resolve_children(|| load_context(location, params))
                .await?
                .unwrap_or_default();
            for child in children.iter().filter(|child| child.path().is_none()) {
                let nested = self.index_branch(child, location, params).await?;
                if !nested.is_empty() {
                    let mut routes = vec![child.clone()];
                    routes.extend(nested);
                    return Ok(routes);
                }
            }
            Ok(Vec::new())
        }
        .boxed()
    }
}

fn load_context(location: &Location, params: &RawParams) -> LoadContext {
    LoadContext {
        location: location.clone(),
        params: merge_params(params),
    }
}

/// Collapse captured values into a map. Later values win; absent optional
/// captures are left out.
pub(crate) fn merge_params(params: &RawParams) -> Params {
    params
        .iter()
        .filter_map(|(name, value)| value.clone().map(|value| (name.clone(), value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::history::{Action, LocationDescriptor};
    use crate::routing::route::ComponentId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn location(path: &str) -> Location {
        Location::new(LocationDescriptor::parse(path), Action::Pop, "test")
    }

    fn labels(result: &MatchResult) -> Vec<String> {
        result.routes.iter().map(|route| route.label()).collect()
    }

    fn app() -> Vec<Arc<Route>> {
        vec![Route::at("/")
            .name("app")
            .component("App")
            .index(Route::builder().name("home").component("Home"))
            .child(
                Route::at("users")
                    .name("users")
                    .component("Users")
                    .child(Route::at(":id").name("user").component("User")),
            )
            .child(Route::at("files/*").name("files"))
            .child(
                Route::builder()
                    .name("layout")
                    .child(Route::at("settings").name("settings")),
            )
            .child(Route::at("*").name("not-found"))
            .build()
            .unwrap()]
    }

    #[tokio::test]
    async fn test_index_route_at_root() {
        let result = Resolver::default()
            .resolve(&app(), &location("/"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["app", "home"]);
        assert_eq!(
            result.components[1].as_ref().and_then(Components::single),
            Some(&ComponentId::new("Home"))
        );
    }

    #[tokio::test]
    async fn test_nested_params() {
        let result = Resolver::default()
            .resolve(&app(), &location("/users/42"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["app", "users", "user"]);
        assert_eq!(result.params.get("id").map(String::as_str), Some("42"));
        assert_eq!(result.components.len(), 3);
    }

    #[tokio::test]
    async fn test_splat_param() {
        let result = Resolver::default()
            .resolve(&app(), &location("/files/a/b/c"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["app", "files"]);
        assert_eq!(result.params.get("splat").map(String::as_str), Some("a/b/c"));
    }

    #[tokio::test]
    async fn test_pathless_layout_and_catch_all_ordering() {
        let routes = app();
        let resolver = Resolver::default();

        let result = resolver.resolve(&routes, &location("/settings")).await.unwrap();
        assert_eq!(labels(&result), vec!["app", "layout", "settings"]);

        // Declared before the catch-all but the catch-all is tried last anyway.
        let result = resolver.resolve(&routes, &location("/nowhere")).await.unwrap();
        assert_eq!(labels(&result), vec!["app", "not-found"]);
    }

    #[tokio::test]
    async fn test_first_declared_sibling_wins() {
        let routes = vec![
            Route::at("/items/:id").name("first").build().unwrap(),
            Route::at("/items/:slug").name("second").build().unwrap(),
        ];
        let result = Resolver::default()
            .resolve(&routes, &location("/items/7"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["first"]);
    }

    #[tokio::test]
    async fn test_not_found() {
        let routes = vec![Route::at("/").child(Route::at("about")).build().unwrap()];
        let err = Resolver::default()
            .resolve(&routes, &location("/does/not/exist"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NotFound { pathname } if pathname == "/does/not/exist"));
    }

    #[tokio::test]
    async fn test_nested_absolute_path() {
        let routes = vec![Route::at("/inbox")
            .name("inbox")
            .child(Route::at("/messages/:id").name("message"))
            .build()
            .unwrap()];
        let result = Resolver::default()
            .resolve(&routes, &location("/messages/5"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["inbox", "message"]);
        assert_eq!(result.params.get("id").map(String::as_str), Some("5"));
    }

    #[tokio::test]
    async fn test_index_route_through_pathless_child() {
        let routes = vec![Route::at("/")
            .name("root")
            .child(
                Route::builder()
                    .name("shell")
                    .index(Route::builder().name("dashboard")),
            )
            .build()
            .unwrap()];
        let result = Resolver::default()
            .resolve(&routes, &location("/"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["root", "shell", "dashboard"]);
    }

    #[tokio::test]
    async fn test_lazy_children_are_loaded_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let routes = vec![Route::at("/admin")
            .name("admin")
            .lazy_children(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Route::at("reports")
                        .name("reports")
                        .build()
                        .map(|route| vec![route])
                        .map_err(BoxError::from)
                }
            })
            .build()
            .unwrap()];

        let resolver = Resolver::default();
        for _ in 0..3 {
            let result = resolver
                .resolve(&routes, &location("/admin/reports"))
                .await
                .unwrap();
            assert_eq!(labels(&result), vec!["admin", "reports"]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unmatched_route_does_not_load_lazy_children() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let routes = vec![
            Route::at("/admin")
                .lazy_children(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(Vec::new()) }
                })
                .build()
                .unwrap(),
            Route::at("/about").name("about").build().unwrap(),
        ];

        let result = Resolver::default()
            .resolve(&routes, &location("/about"))
            .await
            .unwrap();
        assert_eq!(labels(&result), vec!["about"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_component_failure_aborts_match() {
        let routes = vec![Route::at("/broken")
            .lazy_component(|_| async { Err::<Components, _>(BoxError::from("chunk failed")) })
            .build()
            .unwrap()];
        let err = Resolver::default()
            .resolve(&routes, &location("/broken"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Load { what: "component", .. }));
    }

    #[test]
    fn test_cached_tree_resolves_on_first_poll() {
        let routes = app();
        let loc = location("/users/1");
        let resolver = Resolver::default();
        let result = resolver.resolve(&routes, &loc).now_or_never();
        assert!(matches!(result, Some(Ok(_))));
    }

    #[test]
    fn test_merge_params_last_wins() {
        let raw = vec![
            ("id".to_string(), Some("1".to_string())),
            ("tab".to_string(), None),
            ("id".to_string(), Some("2".to_string())),
        ];
        let params = merge_params(&raw);
        assert_eq!(params.get("id").map(String::as_str), Some("2"));
        assert!(!params.contains_key("tab"));
    }
}
