//! Transition hooks and branch diffing.
//!
//! # Responsibilities
//! - Define enter/change/leave hook signatures (sync and async flavors)
//! - Give hooks a context to inspect the states and request a redirect
//! - Split two branches into leaving, changing and entering routes

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;

use crate::error::BoxError;
use crate::history::{Location, LocationDescriptor};
use crate::routing::route::Route;
use crate::routing::Params;
use crate::transition::state::RouterState;

/// Future returned by enter and change hooks.
pub type HookFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Runs when a route enters the branch. Root first.
pub type EnterHook = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

/// Runs when a route stays in the branch but params change. Root first.
pub type ChangeHook = Arc<dyn Fn(HookContext) -> HookFuture + Send + Sync>;

/// Future returned by leave hooks.
pub type LeaveFuture = BoxFuture<'static, LeaveVerdict>;

/// Consulted before a route leaves the branch. Deepest first.
pub type LeaveHook = Arc<dyn Fn(LeaveContext) -> LeaveFuture + Send + Sync>;

/// A leave hook's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveVerdict {
    /// Let the transition continue.
    Allow,
    /// Ask the user; without a confirmation handler this blocks.
    Prompt(String),
    /// Cancel the transition.
    Block,
}

impl From<Option<String>> for LeaveVerdict {
    fn from(message: Option<String>) -> Self {
        match message {
            Some(message) => message.into(),
            None => Self::Allow,
        }
    }
}

impl From<String> for LeaveVerdict {
    fn from(message: String) -> Self {
        if message.is_empty() {
            Self::Allow
        } else {
            Self::Prompt(message)
        }
    }
}

impl From<&str> for LeaveVerdict {
    fn from(message: &str) -> Self {
        message.to_string().into()
    }
}

/// `true` allows, `false` blocks without a prompt.
impl From<bool> for LeaveVerdict {
    fn from(allow: bool) -> Self {
        if allow {
            Self::Allow
        } else {
            Self::Block
        }
    }
}

/// Shared redirect slot written by hooks.
#[derive(Debug, Clone, Default)]
pub(crate) struct RedirectSlot(Arc<Mutex<Option<LocationDescriptor>>>);

impl RedirectSlot {
    fn set(&self, target: LocationDescriptor) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
    }

    pub(crate) fn take(&self) -> Option<LocationDescriptor> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// What enter and change hooks receive.
#[derive(Clone)]
pub struct HookContext {
    route: Arc<Route>,
    prev: Option<Arc<RouterState>>,
    next: Arc<RouterState>,
    redirect: RedirectSlot,
}

impl HookContext {
    pub(crate) fn new(
        route: Arc<Route>,
        prev: Option<Arc<RouterState>>,
        next: Arc<RouterState>,
        redirect: RedirectSlot,
    ) -> Self {
        Self {
            route,
            prev,
            next,
            redirect,
        }
    }

    /// The route the hook belongs to.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// State being transitioned to.
    pub fn next_state(&self) -> &RouterState {
        &self.next
    }

    /// State being left, when there is one.
    pub fn prev_state(&self) -> Option<&RouterState> {
        self.prev.as_deref()
    }

    pub fn location(&self) -> &Location {
        &self.next.location
    }

    pub fn params(&self) -> &Params {
        &self.next.params
    }

    /// Abandon this transition and navigate to `to` instead.
    ///
    /// The target replaces the current history entry.
    pub fn replace(&self, to: impl Into<LocationDescriptor>) {
        self.redirect.set(to.into());
    }
}

/// What leave hooks receive.
#[derive(Clone)]
pub struct LeaveContext {
    route: Arc<Route>,
    prev: Arc<RouterState>,
    next_location: Location,
}

impl LeaveContext {
    pub(crate) fn new(route: Arc<Route>, prev: Arc<RouterState>, next_location: Location) -> Self {
        Self {
            route,
            prev,
            next_location,
        }
    }

    /// The route about to leave.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// State currently published.
    pub fn prev_state(&self) -> &RouterState {
        &self.prev
    }

    /// Where the navigation is headed.
    pub fn next_location(&self) -> &Location {
        &self.next_location
    }
}

/// Wrap a synchronous enter hook.
pub fn enter_hook<F>(hook: F) -> EnterHook
where
    F: Fn(&HookContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    Arc::new(move |ctx: HookContext| future::ready(hook(&ctx)).boxed())
}

/// Wrap an asynchronous enter hook.
pub fn enter_hook_async<F, Fut>(hook: F) -> EnterHook
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx: HookContext| hook(ctx).boxed())
}

/// Wrap a synchronous change hook.
pub fn change_hook<F>(hook: F) -> ChangeHook
where
    F: Fn(&HookContext) -> Result<(), BoxError> + Send + Sync + 'static,
{
    enter_hook(hook)
}

/// Wrap an asynchronous change hook.
pub fn change_hook_async<F, Fut>(hook: F) -> ChangeHook
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    enter_hook_async(hook)
}

/// Wrap a synchronous leave hook.
pub fn leave_hook<F, V>(hook: F) -> LeaveHook
where
    F: Fn(&LeaveContext) -> V + Send + Sync + 'static,
    V: Into<LeaveVerdict>,
{
    Arc::new(move |ctx: LeaveContext| {
        let verdict: LeaveVerdict = hook(&ctx).into();
        future::ready(verdict).boxed()
    })
}

/// Wrap an asynchronous leave hook.
pub fn leave_hook_async<F, Fut>(hook: F) -> LeaveHook
where
    F: Fn(LeaveContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LeaveVerdict> + Send + 'static,
{
    Arc::new(move |ctx: LeaveContext| hook(ctx).boxed())
}

/// Routes split by how they take part in a transition.
#[derive(Debug, Default)]
pub struct ChangedRoutes {
    /// In the previous branch only. Deepest first.
    pub leaving: Vec<Arc<Route>>,
    /// In both branches, with different params. Root first.
    pub changing: Vec<Arc<Route>>,
    /// In the next branch only. Root first.
    pub entering: Vec<Arc<Route>>,
}

impl ChangedRoutes {
    pub fn compute(prev: Option<&RouterState>, next: &RouterState) -> Self {
        let Some(prev) = prev else {
            return Self {
                entering: next.routes.clone(),
                ..Self::default()
            };
        };

        let mut leaving: Vec<_> = prev
            .routes
            .iter()
            .filter(|route| !next.contains(route))
            .cloned()
            .collect();
        leaving.reverse();

        let params_changed = prev.params != next.params;
        let (retained, entering): (Vec<_>, Vec<_>) = next
            .routes
            .iter()
            .cloned()
            .partition(|route| prev.contains(route));

        Self {
            leaving,
            changing: if params_changed { retained } else { Vec::new() },
            entering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Action;

    fn state(path: &str, routes: &[Arc<Route>], params: &[(&str, &str)]) -> RouterState {
        RouterState {
            location: Location::new(LocationDescriptor::parse(path), Action::Push, "k"),
            routes: routes.to_vec(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            components: vec![None; routes.len()],
        }
    }

    #[test]
    fn test_verdict_conversions() {
        assert_eq!(LeaveVerdict::from(None), LeaveVerdict::Allow);
        assert_eq!(LeaveVerdict::from(""), LeaveVerdict::Allow);
        assert_eq!(
            LeaveVerdict::from("unsaved"),
            LeaveVerdict::Prompt("unsaved".into())
        );
        assert_eq!(LeaveVerdict::from(false), LeaveVerdict::Block);
        assert_eq!(LeaveVerdict::from(true), LeaveVerdict::Allow);
    }

    #[test]
    fn test_initial_transition_enters_everything() {
        let root = Route::at("/").build().unwrap();
        let child = Route::at("a").build().unwrap();
        let next = state("/a", &[root.clone(), child.clone()], &[]);

        let changes = ChangedRoutes::compute(None, &next);
        assert!(changes.leaving.is_empty());
        assert!(changes.changing.is_empty());
        assert_eq!(changes.entering, vec![root, child]);
    }

    #[test]
    fn test_sibling_switch() {
        let root = Route::at("/").build().unwrap();
        let a = Route::at("a").build().unwrap();
        let a_leaf = Route::at("x").build().unwrap();
        let b = Route::at("b").build().unwrap();

        let prev = state("/a/x", &[root.clone(), a.clone(), a_leaf.clone()], &[]);
        let next = state("/b", &[root.clone(), b.clone()], &[]);

        let changes = ChangedRoutes::compute(Some(&prev), &next);
        // Deepest first
        assert_eq!(changes.leaving, vec![a_leaf, a]);
        assert!(changes.changing.is_empty());
        assert_eq!(changes.entering, vec![b]);
    }

    #[test]
    fn test_param_change_marks_retained_routes() {
        let root = Route::at("/").build().unwrap();
        let user = Route::at("users/:id").build().unwrap();

        let prev = state("/users/1", &[root.clone(), user.clone()], &[("id", "1")]);
        let next = state("/users/2", &[root.clone(), user.clone()], &[("id", "2")]);

        let changes = ChangedRoutes::compute(Some(&prev), &next);
        assert!(changes.leaving.is_empty());
        assert_eq!(changes.changing, vec![root, user]);
        assert!(changes.entering.is_empty());
    }

    #[test]
    fn test_redirect_slot() {
        let root = Route::at("/").build().unwrap();
        let next = Arc::new(state("/", &[root.clone()], &[]));
        let slot = RedirectSlot::default();
        let ctx = HookContext::new(root, None, next, slot.clone());

        ctx.replace("/login?next=%2F");
        let target = slot.take().unwrap();
        assert_eq!(target.pathname, "/login");
        assert!(slot.take().is_none());
    }
}
