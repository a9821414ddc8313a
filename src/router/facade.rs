//! The router handle given to the rendering layer.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::FutureExt;

use crate::config::{ConfigError, RouterConfig};
use crate::context::ContextPublisher;
use crate::error::{RouterError, RouterResult};
use crate::history::{LocationDescriptor, LocationSource};
use crate::lifecycle::Unlisten;
use crate::routing::Route;
use crate::transition::hooks::{leave_hook, leave_hook_async, LeaveContext, LeaveVerdict};
use crate::transition::{RouterState, StateHandle, TransitionManager, UserConfirmation};

/// Receives transition errors instead of the log.
pub type ErrorHandler = Arc<dyn Fn(&RouterError) + Send + Sync>;

/// Called after every published state, before context subscribers.
pub type UpdateHandler = Arc<dyn Fn(&RouterState) + Send + Sync>;

struct Shared {
    manager: Arc<TransitionManager>,
    context: ContextPublisher,
    on_error: Option<ErrorHandler>,
    on_update: Option<UpdateHandler>,
    unlisten: Mutex<Option<Unlisten>>,
    /// Router calls currently waiting for an inline transition.
    navigating: AtomicUsize,
    /// Unhandled error raised while `navigating` was non-zero.
    unhandled: Mutex<Option<RouterError>>,
}

impl Shared {
    fn published(&self, state: &RouterState) {
        if let Some(on_update) = &self.on_update {
            on_update(state);
        }
        self.context.notify();
    }

    fn failed(&self, err: RouterError) {
        if let Some(on_error) = &self.on_error {
            return on_error(&err);
        }
        if self.navigating.load(Ordering::SeqCst) == 0 {
            tracing::error!(error = %err, "Router transition failed");
            return;
        }
        let mut unhandled = lock(&self.unhandled);
        if unhandled.is_none() {
            *unhandled = Some(err);
        }
    }

    /// Run `operation` and hand back an unhandled error it caused inline.
    fn navigate(&self, operation: impl FnOnce()) -> RouterResult<()> {
        self.navigating.fetch_add(1, Ordering::SeqCst);
        operation();
        if self.navigating.fetch_sub(1, Ordering::SeqCst) > 1 {
            return Ok(());
        }
        lock(&self.unhandled).take().map_or(Ok(()), Err)
    }
}

/// Stable, cheaply cloned router handle. Clones share identity.
#[derive(Clone)]
pub struct Router {
    shared: Arc<Shared>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Start listening to the location source. Calling it again is a no-op.
    ///
    /// Without an `on_error` handler, a failed first transition that completes
    /// inline is returned here.
    pub fn start(&self) -> RouterResult<()> {
        if self.is_started() {
            return Ok(());
        }

        // The first transition may publish inside `listen`, so no lock is held here.
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        let mut handle = None;
        let result = self.shared.navigate(|| {
            handle = Some(self.shared.manager.listen(Arc::new(move |result| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                match result {
                    Ok(state) => shared.published(&state),
                    Err(err) => shared.failed(err),
                }
            })));
        });
        *lock(&self.shared.unlisten) = handle;
        tracing::debug!("Router started");
        result
    }

    /// Stop listening. In-flight transitions are dropped.
    pub fn stop(&self) {
        let unlisten = lock(&self.shared.unlisten).take();
        if let Some(unlisten) = unlisten {
            unlisten.unlisten();
            tracing::debug!("Router stopped");
        }
    }

    pub fn is_started(&self) -> bool {
        lock(&self.shared.unlisten).is_some()
    }

    fn source(&self) -> &Arc<dyn LocationSource> {
        self.shared.manager.source()
    }

    /// Navigate to `to`, adding a history entry.
    ///
    /// Errors are returned only when no `on_error` handler is set and the
    /// transition finished before this call returned.
    pub fn push(&self, to: impl Into<LocationDescriptor>) -> RouterResult<()> {
        let to = to.into();
        self.shared.navigate(|| self.source().push(to))
    }

    pub fn replace(&self, to: impl Into<LocationDescriptor>) -> RouterResult<()> {
        let to = to.into();
        self.shared.navigate(|| self.source().replace(to))
    }

    pub fn go(&self, delta: isize) -> RouterResult<()> {
        self.shared.navigate(|| self.source().go(delta))
    }

    pub fn go_back(&self) -> RouterResult<()> {
        self.go(-1)
    }

    pub fn go_forward(&self) -> RouterResult<()> {
        self.go(1)
    }

    pub fn create_href(&self, to: impl Into<LocationDescriptor>) -> String {
        self.source().create_href(&to.into())
    }

    /// True when `to` is active; `index_only` requires an exact pathname match.
    pub fn is_active(&self, to: impl Into<LocationDescriptor>, index_only: bool) -> bool {
        self.shared.manager.is_active(&to.into(), index_only)
    }

    /// Consult `hook` before `route` leaves the branch.
    ///
    /// The hook is dropped automatically once the route has left.
    pub fn set_route_leave_hook<F, V>(&self, route: &Route, hook: F) -> Unlisten
    where
        F: Fn(&LeaveContext) -> V + Send + Sync + 'static,
        V: Into<LeaveVerdict>,
    {
        self.shared
            .manager
            .register_leave_hook(route, leave_hook(hook))
    }

    pub fn set_route_leave_hook_async<F, Fut>(&self, route: &Route, hook: F) -> Unlisten
    where
        F: Fn(LeaveContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LeaveVerdict> + Send + 'static,
    {
        self.shared
            .manager
            .register_leave_hook(route, leave_hook_async(hook))
    }

    /// The currently published state.
    pub fn state(&self) -> Option<Arc<RouterState>> {
        self.shared.manager.state()
    }

    /// Handle that always reads the latest state.
    pub fn state_handle(&self) -> StateHandle {
        self.shared.manager.state_handle()
    }

    /// Channel bumped after every published state.
    pub fn context(&self) -> &ContextPublisher {
        &self.shared.context
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        self.shared.manager.routes()
    }

    /// True when both handles are the same router.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("started", &self.is_started())
            .field("state", &self.state().map(|state| state.location.path()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Router`].
#[derive(Default)]
pub struct RouterBuilder {
    history: Option<Arc<dyn LocationSource>>,
    routes: Vec<Arc<Route>>,
    config: RouterConfig,
    on_error: Option<ErrorHandler>,
    on_update: Option<UpdateHandler>,
    confirmation: Option<UserConfirmation>,
}

impl RouterBuilder {
    pub fn history(mut self, history: Arc<dyn LocationSource>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn route(mut self, route: Arc<Route>) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(mut self, routes: impl IntoIterator<Item = Arc<Route>>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Settings, plus a route tree used when no routes are given in code.
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_error(mut self, handler: impl Fn(&RouterError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn on_update(mut self, handler: impl Fn(&RouterState) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(handler));
        self
    }

    /// Answer leave prompts synchronously.
    pub fn confirm_with(mut self, confirm: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.confirmation = Some(Arc::new(move |message: String| {
            futures_util::future::ready(confirm(&message)).boxed()
        }));
        self
    }

    pub fn confirm_with_async<F, Fut>(mut self, confirm: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.confirmation = Some(Arc::new(move |message: String| confirm(message).boxed()));
        self
    }

    pub fn build(self) -> Result<Router, ConfigError> {
        let history = self.history.ok_or(ConfigError::MissingHistory)?;
        let routes = if self.routes.is_empty() {
            self.config.build_routes()?
        } else {
            self.routes
        };
        if routes.is_empty() {
            return Err(ConfigError::MissingRoutes);
        }

        let mut manager = TransitionManager::new(history, routes, &self.config);
        if let Some(confirmation) = self.confirmation {
            manager = manager.with_confirmation(confirmation);
        }

        Ok(Router {
            shared: Arc::new(Shared {
                manager: Arc::new(manager),
                context: ContextPublisher::new(),
                on_error: self.on_error,
                on_update: self.on_update,
                unlisten: Mutex::new(None),
                navigating: AtomicUsize::new(0),
                unhandled: Mutex::new(None),
            }),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
