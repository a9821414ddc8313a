//! Transition orchestration.
//!
//! # Responsibilities
//! - Start a match for every location event, superseding the one in flight
//! - Confirm leaving routes, then run change and enter hooks
//! - Follow hook redirects, bounded by `max_redirects`
//! - Publish the new state and notify the single listener
//!
//! # States
//! ```text
//! IDLE → MATCHING → CONFIRMING_LEAVE → HOOKS → PUBLISHED
//!            │              │            │
//!            │              │            └→ redirect: source.replace(..), new event
//!            │              └→ blocked: revert the source, nothing published
//!            └→ superseded at any await: result dropped silently
//! ```
//!
//! # Design Decisions
//! - Supersede is identity based: a generation counter checked after every await
//! - A transition is polled once inline; only a suspended one is spawned on Tokio,
//!   so fully cached trees publish before `handle_location` returns
//! - Superseded loads are left to finish so their memoized values can be reused
//! - No lock is held while calling hooks, loaders, listeners or the location source

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::task::noop_waker_ref;
use futures_util::FutureExt;

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::history::{Action, Location, LocationDescriptor, LocationSource};
use crate::lifecycle::Unlisten;
use crate::observability::metrics::{self, TransitionOutcome};
use crate::routing::active;
use crate::routing::route::{Route, RouteId};
use crate::routing::Resolver;
use crate::transition::hooks::{
    ChangedRoutes, HookContext, LeaveContext, LeaveHook, LeaveVerdict, RedirectSlot,
};
use crate::transition::state::{RouterState, StateHandle};

/// Receives every published state or transition error.
pub type TransitionListener = Arc<dyn Fn(Result<Arc<RouterState>, RouterError>) + Send + Sync>;

/// Asks the user whether to leave despite a leave hook's prompt.
pub type UserConfirmation = Arc<dyn Fn(String) -> BoxFuture<'static, bool> + Send + Sync>;

#[derive(Default)]
struct Pending {
    /// The next location event is our own revert of a blocked transition.
    reverting: bool,
    /// Redirect hops that led to the next location event.
    redirect_depth: u32,
}

/// Drives transitions for one route tree and one location source.
pub struct TransitionManager {
    source: Arc<dyn LocationSource>,
    routes: Vec<Arc<Route>>,
    resolver: Resolver,
    max_redirects: u32,
    state: StateHandle,
    confirmation: Option<UserConfirmation>,
    generation: AtomicU64,
    listener: Mutex<Option<(u64, TransitionListener)>>,
    source_unlisten: Mutex<Option<Unlisten>>,
    pending: Mutex<Pending>,
    leave_hooks: DashMap<RouteId, Vec<(u64, LeaveHook)>>,
    next_id: AtomicU64,
}

impl TransitionManager {
    pub fn new(
        source: Arc<dyn LocationSource>,
        routes: Vec<Arc<Route>>,
        config: &RouterConfig,
    ) -> Self {
        Self {
            source,
            routes,
            resolver: Resolver::new(config.matching.decode_params),
            max_redirects: config.transitions.max_redirects,
            state: StateHandle::new(),
            confirmation: None,
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
            source_unlisten: Mutex::new(None),
            pending: Mutex::new(Pending::default()),
            leave_hooks: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Route `Prompt` verdicts to a user confirmation instead of blocking.
    pub fn with_confirmation(mut self, confirmation: UserConfirmation) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn source(&self) -> &Arc<dyn LocationSource> {
        &self.source
    }

    /// The currently published state.
    pub fn state(&self) -> Option<Arc<RouterState>> {
        self.state.load()
    }

    pub fn state_handle(&self) -> StateHandle {
        self.state.clone()
    }

    /// Set the single listener, replacing any previous one.
    ///
    /// A state that is already published is replayed to the new listener right
    /// away; otherwise the source's current location is matched.
    pub fn listen(self: &Arc<Self>, listener: TransitionListener) -> Unlisten {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *lock(&self.listener) = Some((id, listener.clone()));
        self.subscribe_source();

        match self.state.load() {
            Some(state) => listener(Ok(state)),
            None => self.handle_location(self.source.current_location()),
        }

        let manager = Arc::downgrade(self);
        Unlisten::new(move || {
            if let Some(manager) = manager.upgrade() {
                manager.remove_listener(id);
            }
        })
    }

    fn subscribe_source(self: &Arc<Self>) {
        if lock(&self.source_unlisten).is_some() {
            return;
        }
        lock(&self.pending).reverting = false;

        let manager: Weak<Self> = Arc::downgrade(self);
        let unlisten = self.source.listen(Arc::new(move |location: &Location| {
            if let Some(manager) = manager.upgrade() {
                manager.handle_location(location.clone());
            }
        }));
        *lock(&self.source_unlisten) = Some(unlisten);
    }

    fn remove_listener(&self, id: u64) {
        {
            let mut listener = lock(&self.listener);
            if !matches!(&*listener, Some((current, _)) if *current == id) {
                return;
            }
            *listener = None;
        }

        // Drop whatever is in flight.
        self.generation.fetch_add(1, Ordering::SeqCst);
        let unlisten = lock(&self.source_unlisten).take();
        if let Some(unlisten) = unlisten {
            unlisten.unlisten();
        }
        tracing::debug!("Transition listener removed");
    }

    /// Start a transition to `location`, superseding any in flight.
    pub fn handle_location(self: &Arc<Self>, location: Location) {
        let redirect_depth = {
            let mut pending = lock(&self.pending);
            if pending.reverting {
                pending.reverting = false;
                tracing::trace!(path = %location.path(), "Ignoring reverted location");
                return;
            }
            std::mem::take(&mut pending.redirect_depth)
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(
            generation,
            path = %location.path(),
            action = ?location.action,
            "Transition started"
        );

        let manager = self.clone();
        let mut transition =
            async move { manager.run(generation, location, redirect_depth).await }.boxed();

        let mut cx = Context::from_waker(noop_waker_ref());
        if let Poll::Ready(()) = transition.poll_unpin(&mut cx) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(transition);
            }
            Err(_) => {
                tracing::error!(generation, "Transition suspended outside a Tokio runtime");
                self.fail(generation, RouterError::Runtime);
            }
        }
    }

    async fn run(self: Arc<Self>, generation: u64, location: Location, redirect_depth: u32) {
        let prev = self.state.load();

        let matched = match self.resolver.resolve(&self.routes, &location).await {
            Ok(matched) => matched,
            Err(err) => return self.fail(generation, err),
        };
        if self.is_superseded(generation) {
            return;
        }

        let next = Arc::new(RouterState {
            location: location.clone(),
            routes: matched.routes,
            params: matched.params,
            components: matched.components,
        });
        let changes = ChangedRoutes::compute(prev.as_deref(), &next);

        if let Some(prev) = &prev {
            let allowed = self.confirm_leave(&changes.leaving, prev, &location).await;
            if self.is_superseded(generation) {
                return;
            }
            if !allowed {
                tracing::warn!(
                    generation,
                    path = %location.path(),
                    "Transition blocked by leave hook"
                );
                metrics::record_transition(TransitionOutcome::Blocked);
                self.revert(prev, location.action);
                return;
            }
        }

        let redirect = RedirectSlot::default();
        let hooks = changes
            .changing
            .iter()
            .filter_map(|route| Some((route, route.change_hook()?)))
            .chain(
                changes
                    .entering
                    .iter()
                    .filter_map(|route| Some((route, route.enter_hook()?))),
            );
        for (route, hook) in hooks {
            let context = HookContext::new(route.clone(), prev.clone(), next.clone(), redirect.clone());
            let result = hook(context).await;
            if self.is_superseded(generation) {
                return;
            }
            if let Err(source) = result {
                return self.fail(
                    generation,
                    RouterError::Hook {
                        route: route.label(),
                        source,
                    },
                );
            }
            if let Some(target) = redirect.take() {
                return self.redirect(generation, redirect_depth, target);
            }
        }

        for route in &changes.leaving {
            self.leave_hooks.remove(&route.id());
        }

        self.state.store(next.clone());
        metrics::record_transition(TransitionOutcome::Published);
        tracing::info!(
            generation,
            path = %next.location.path(),
            routes = next.routes.len(),
            "Router state published"
        );
        self.emit(Ok(next));
    }

    async fn confirm_leave(
        &self,
        leaving: &[Arc<Route>],
        prev: &Arc<RouterState>,
        next_location: &Location,
    ) -> bool {
        for route in leaving {
            for hook in self.leave_hooks_for(route) {
                let context = LeaveContext::new(route.clone(), prev.clone(), next_location.clone());
                match hook(context).await {
                    LeaveVerdict::Allow => {}
                    LeaveVerdict::Block => return false,
                    LeaveVerdict::Prompt(message) => {
                        let confirmed = match &self.confirmation {
                            Some(confirm) => confirm(message).await,
                            None => false,
                        };
                        if !confirmed {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// The route's own leave hook followed by dynamically registered ones.
    fn leave_hooks_for(&self, route: &Route) -> Vec<LeaveHook> {
        let mut hooks: Vec<LeaveHook> = route.leave_hook().cloned().into_iter().collect();
        if let Some(registered) = self.leave_hooks.get(&route.id()) {
            hooks.extend(registered.iter().map(|(_, hook)| hook.clone()));
        }
        hooks
    }

    /// Put the source back on the published location.
    fn revert(&self, prev: &RouterState, action: Action) {
        match action {
            Action::Pop => self.revert_with(|source| source.push(prev.location.descriptor())),
            Action::Push => {
                self.revert_with(|source| source.go(-1));
                // A superseded push can sit between the published entry and the vetoed one.
                if self.source.current_location().path() != prev.location.path() {
                    self.revert_with(|source| source.replace(prev.location.descriptor()));
                }
            }
            Action::Replace => self.revert_with(|source| source.replace(prev.location.descriptor())),
        }
    }

    /// Call the source with the next location event marked as our own.
    fn revert_with(&self, operation: impl FnOnce(&dyn LocationSource)) {
        lock(&self.pending).reverting = true;
        operation(self.source.as_ref());
    }

    fn redirect(&self, generation: u64, depth: u32, target: LocationDescriptor) {
        if depth >= self.max_redirects {
            return self.fail(
                generation,
                RouterError::RedirectLimit {
                    limit: self.max_redirects,
                    pathname: target.pathname,
                },
            );
        }

        metrics::record_redirect();
        metrics::record_transition(TransitionOutcome::Redirected);
        tracing::info!(generation, to = %target.path(), depth = depth + 1, "Redirecting");

        lock(&self.pending).redirect_depth = depth + 1;
        self.source.replace(target);
    }

    fn fail(&self, generation: u64, err: RouterError) {
        if self.is_superseded(generation) {
            return;
        }

        let outcome = match &err {
            RouterError::NotFound { .. } => TransitionOutcome::NotFound,
            RouterError::Load { .. } => TransitionOutcome::LoadError,
            RouterError::Hook { .. } => TransitionOutcome::HookError,
            RouterError::RedirectLimit { .. } => TransitionOutcome::RedirectLimit,
            RouterError::Runtime => TransitionOutcome::RuntimeError,
        };
        metrics::record_transition(outcome);

        match &err {
            RouterError::NotFound { pathname } => {
                tracing::warn!(generation, pathname = %pathname, "No route matched");
            }
            other => tracing::debug!(generation, error = %other, "Transition failed"),
        }
        self.emit(Err(err));
    }

    fn emit(&self, result: Result<Arc<RouterState>, RouterError>) {
        let listener = lock(&self.listener).as_ref().map(|(_, listener)| listener.clone());
        match (listener, result) {
            (Some(listener), result) => listener(result),
            (None, Err(err)) => tracing::error!(error = %err, "Unhandled transition error"),
            (None, Ok(_)) => {}
        }
    }

    fn is_superseded(&self, generation: u64) -> bool {
        let superseded = self.generation.load(Ordering::SeqCst) != generation;
        if superseded {
            metrics::record_transition(TransitionOutcome::Superseded);
            tracing::debug!(generation, "Transition superseded");
        }
        superseded
    }

    /// Add a leave hook for `route`. It is dropped once the route leaves the branch.
    pub fn register_leave_hook(self: &Arc<Self>, route: &Route, hook: LeaveHook) -> Unlisten {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let route_id = route.id();
        if !self.state.load().is_some_and(|state| state.contains(route)) {
            tracing::debug!(route = %route.label(), "Leave hook registered for an inactive route");
        }
        self.leave_hooks.entry(route_id).or_default().push((id, hook));

        let manager = Arc::downgrade(self);
        Unlisten::new(move || {
            let Some(manager) = manager.upgrade() else {
                return;
            };
            if let Some(mut hooks) = manager.leave_hooks.get_mut(&route_id) {
                hooks.retain(|(hook_id, _)| *hook_id != id);
            }
            manager
                .leave_hooks
                .remove_if(&route_id, |_, hooks| hooks.is_empty());
        })
    }

    /// Number of dynamically registered leave hooks for `route`.
    pub fn leave_hook_count(&self, route: &Route) -> usize {
        self.leave_hooks
            .get(&route.id())
            .map_or(0, |hooks| hooks.len())
    }

    /// True when `location` is active for the published state.
    pub fn is_active(&self, location: &LocationDescriptor, index_only: bool) -> bool {
        let Some(state) = self.state.load() else {
            return false;
        };
        active::is_active(
            location,
            index_only,
            &state.location,
            &state.routes,
            &state.params,
            self.resolver.decode_params(),
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
