//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::oneshot;

use nested_router::routing::{Components, LoadContext};
use nested_router::{BoxError, MemoryHistory, Route, Router, RouterBuilder};

/// Something the router reported to its handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Path of a published state.
    Published(String),
    /// Display text of a transition error.
    Failed(String),
}

/// Records `on_update` and `on_error` calls in order.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the recorder into a router builder.
    pub fn attach(&self, builder: RouterBuilder) -> RouterBuilder {
        let updates = self.events.clone();
        let errors = self.events.clone();
        builder
            .on_update(move |state| {
                updates
                    .lock()
                    .unwrap()
                    .push(Event::Published(state.location.path()));
            })
            .on_error(move |err| errors.lock().unwrap().push(Event::Failed(err.to_string())))
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Published(path) => Some(path),
                Event::Failed(_) => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Failed(message) => Some(message),
                Event::Published(_) => None,
            })
            .collect()
    }
}

/// Build and start a router over `history`, recording into `recorder`.
pub fn start_router(
    history: &Arc<MemoryHistory>,
    routes: Vec<Arc<Route>>,
    recorder: &Recorder,
) -> Router {
    let router = recorder
        .attach(Router::builder().history(history.clone()).routes(routes))
        .build()
        .unwrap();
    router.start().unwrap();
    router
}

/// Labels of the currently published branch.
pub fn branch(router: &Router) -> Vec<String> {
    router
        .state()
        .map(|state| state.routes.iter().map(|route| route.label()).collect())
        .unwrap_or_default()
}

/// Pathnames of every history entry.
pub fn entries(history: &MemoryHistory) -> Vec<String> {
    history
        .entries()
        .into_iter()
        .map(|location| location.pathname)
        .collect()
}

/// Let spawned transitions run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

type ComponentLoader =
    Box<dyn Fn(LoadContext) -> BoxFuture<'static, Result<Components, BoxError>> + Send + Sync>;

/// A lazy component that stays pending until the sender fires.
///
/// Sending `Err(message)` makes the load fail. Later loads resolve immediately.
pub fn gated_component(name: &'static str) -> (oneshot::Sender<Result<(), String>>, ComponentLoader) {
    let (tx, rx) = oneshot::channel::<Result<(), String>>();
    let rx = Arc::new(Mutex::new(Some(rx)));

    let loader: ComponentLoader = Box::new(move |_| {
        let rx = rx.lock().unwrap().take();
        async move {
            match rx {
                None => Ok(Components::from(name)),
                Some(rx) => match rx.await {
                    Ok(Ok(())) => Ok(Components::from(name)),
                    Ok(Err(message)) => Err(BoxError::from(message)),
                    Err(_) => Err(BoxError::from("gate dropped")),
                },
            }
        }
        .boxed()
    });
    (tx, loader)
}
