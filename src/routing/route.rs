//! Route nodes and their builder.
//!
//! # Responsibilities
//! - Hold a compiled path pattern, hooks and (possibly lazy) children/index/components
//! - Memoize lazily loaded values on the node
//! - Give every node a process-unique identity
//!
//! # Design Decisions
//! - A lazy value loads at most once; concurrent callers wait on the same load
//! - A failed load is not cached, the next navigation tries again
//! - Nodes are immutable apart from their memo cells and shared as `Arc<Route>`

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Serialize, Serializer};
use tokio::sync::OnceCell;

use crate::error::{BoxError, RouterError};
use crate::history::Location;
use crate::routing::pattern::{PathPattern, PatternError};
use crate::routing::Params;
use crate::transition::hooks::{
    change_hook, change_hook_async, enter_hook, enter_hook_async, leave_hook, leave_hook_async,
    ChangeHook, EnterHook, HookContext, LeaveContext, LeaveHook, LeaveVerdict,
};

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique route identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteId(u64);

impl RouteId {
    fn next() -> Self {
        Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a view the rendering layer knows how to build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Arc<str>);

impl ComponentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ComponentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// The view(s) a route renders: one component, or named slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Components {
    Single(ComponentId),
    Named(BTreeMap<String, ComponentId>),
}

impl Components {
    /// Build named slots from `(slot, component)` pairs.
    pub fn named<I, K, V>(slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ComponentId>,
    {
        Self::Named(
            slots
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The single component, if this is not a named set.
    pub fn single(&self) -> Option<&ComponentId> {
        match self {
            Self::Single(id) => Some(id),
            Self::Named(_) => None,
        }
    }
}

impl From<&str> for Components {
    fn from(id: &str) -> Self {
        Self::Single(id.into())
    }
}

impl From<String> for Components {
    fn from(id: String) -> Self {
        Self::Single(id.into())
    }
}

impl From<ComponentId> for Components {
    fn from(id: ComponentId) -> Self {
        Self::Single(id)
    }
}

/// What a lazy loader gets to look at.
#[derive(Debug, Clone)]
pub struct LoadContext {
    pub location: Location,
    /// Params accumulated down to the loading route.
    pub params: Params,
}

/// Future returned by lazy loaders.
pub type LoadFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

/// Asynchronous producer of a route's children, index route or components.
pub type Loader<T> = Arc<dyn Fn(LoadContext) -> LoadFuture<T> + Send + Sync>;

/// A value that is either present up front or produced once by a loader.
struct Lazy<T> {
    cell: OnceCell<T>,
    loader: Option<Loader<T>>,
}

impl<T: Send + Sync> Lazy<T> {
    fn ready(value: T) -> Self {
        Self {
            cell: OnceCell::new_with(Some(value)),
            loader: None,
        }
    }

    fn deferred(loader: Loader<T>) -> Self {
        Self {
            cell: OnceCell::new(),
            loader: Some(loader),
        }
    }

    fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    fn is_lazy(&self) -> bool {
        self.loader.is_some()
    }

    async fn resolve(&self, context: impl FnOnce() -> LoadContext) -> Result<&T, BoxError> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let loader = self.loader.clone().ok_or("lazy value has no loader")?;
        self.cell.get_or_try_init(|| loader(context())).await
    }
}

fn wrap_loader<T, F, Fut>(loader: F) -> Loader<T>
where
    F: Fn(LoadContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    Arc::new(move |context| loader(context).boxed())
}

/// A node in the route configuration tree.
pub struct Route {
    id: RouteId,
    name: Option<String>,
    path: Option<PathPattern>,
    component: Option<Lazy<Components>>,
    children: Option<Lazy<Vec<Arc<Route>>>>,
    index_route: Option<Lazy<Arc<Route>>>,
    on_enter: Option<EnterHook>,
    on_change: Option<ChangeHook>,
    on_leave: Option<LeaveHook>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("path", &self.path.as_ref().map(PathPattern::as_str))
            .field("children", &self.children.as_ref().and_then(Lazy::get).map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Route {}

impl Route {
    /// Start building a route. Without `.path(..)` it is a path-less layout route.
    pub fn builder() -> RouteBuilder {
        RouteBuilder::default()
    }

    /// Shorthand for a route with a path.
    pub fn at(path: impl Into<String>) -> RouteBuilder {
        RouteBuilder::default().path(path)
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> Option<&PathPattern> {
        self.path.as_ref()
    }

    /// Human-readable label for logs and errors.
    pub fn label(&self) -> String {
        match (&self.name, &self.path) {
            (Some(name), _) => name.clone(),
            (None, Some(path)) => format!("`{}`", path),
            (None, None) => self.id.to_string(),
        }
    }

    /// Sibling ordering tier: patterned, then path-less, then catch-all.
    pub(crate) fn match_tier(&self) -> u8 {
        match &self.path {
            Some(path) if path.is_catch_all() => 2,
            Some(_) => 0,
            None => 1,
        }
    }

    /// Children that are available without loading anything.
    pub fn loaded_children(&self) -> Option<&[Arc<Route>]> {
        self.children.as_ref()?.get().map(Vec::as_slice)
    }

    /// The index route, if present or already loaded.
    pub fn loaded_index_route(&self) -> Option<&Arc<Route>> {
        self.index_route.as_ref()?.get()
    }

    /// The components, if static or already loaded.
    pub fn loaded_components(&self) -> Option<&Components> {
        self.component.as_ref()?.get()
    }

    /// True when any part of this node still has to be loaded.
    pub fn has_pending_loads(&self) -> bool {
        let pending = |lazy: bool, loaded: bool| lazy && !loaded;
        pending(
            self.children.as_ref().is_some_and(Lazy::is_lazy),
            self.loaded_children().is_some(),
        ) || pending(
            self.index_route.as_ref().is_some_and(Lazy::is_lazy),
            self.loaded_index_route().is_some(),
        ) || pending(
            self.component.as_ref().is_some_and(Lazy::is_lazy),
            self.loaded_components().is_some(),
        )
    }

    pub(crate) async fn resolve_children(
        &self,
        context: impl FnOnce() -> LoadContext,
    ) -> Result<Option<&[Arc<Route>]>, RouterError> {
        let Some(children) = &self.children else {
            return Ok(None);
        };
        let loaded = children
            .resolve(context)
            .await
            .map_err(|source| self.load_error("children", source))?;
        Ok(Some(loaded.as_slice()))
    }

    pub(crate) async fn resolve_index_route(
        &self,
        context: impl FnOnce() -> LoadContext,
    ) -> Result<Option<&Arc<Route>>, RouterError> {
        let Some(index) = &self.index_route else {
            return Ok(None);
        };
        let loaded = index
            .resolve(context)
            .await
            .map_err(|source| self.load_error("index route", source))?;
        Ok(Some(loaded))
    }

    pub(crate) async fn resolve_components(
        &self,
        context: &LoadContext,
    ) -> Result<Option<Components>, RouterError> {
        let Some(component) = &self.component else {
            return Ok(None);
        };
        let loaded = component
            .resolve(|| context.clone())
            .await
            .map_err(|source| self.load_error("component", source))?;
        Ok(Some(loaded.clone()))
    }

    pub(crate) fn enter_hook(&self) -> Option<&EnterHook> {
        self.on_enter.as_ref()
    }

    pub(crate) fn change_hook(&self) -> Option<&ChangeHook> {
        self.on_change.as_ref()
    }

    pub(crate) fn leave_hook(&self) -> Option<&LeaveHook> {
        self.on_leave.as_ref()
    }

    fn load_error(&self, what: &'static str, source: BoxError) -> RouterError {
        tracing::warn!(route = %self.label(), what, error = %source, "Lazy load failed");
        RouterError::Load {
            route: self.label(),
            what,
            source,
        }
    }
}

enum ChildSpec {
    None,
    Static(Vec<RouteBuilder>),
    Lazy(Loader<Vec<Arc<Route>>>),
}

enum IndexSpec {
    None,
    Static(Box<RouteBuilder>),
    Lazy(Loader<Arc<Route>>),
}

enum ComponentSpec {
    None,
    Static(Components),
    Lazy(Loader<Components>),
}

/// Builder for [`Route`] trees.
pub struct RouteBuilder {
    name: Option<String>,
    path: Option<String>,
    component: ComponentSpec,
    children: ChildSpec,
    index: IndexSpec,
    on_enter: Option<EnterHook>,
    on_change: Option<ChangeHook>,
    on_leave: Option<LeaveHook>,
}

impl Default for RouteBuilder {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            component: ComponentSpec::None,
            children: ChildSpec::None,
            index: IndexSpec::None,
            on_enter: None,
            on_change: None,
            on_leave: None,
        }
    }
}

impl RouteBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Path pattern. An empty string means path-less.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.is_empty() { None } else { Some(path) };
        self
    }

    pub fn component(mut self, component: impl Into<Components>) -> Self {
        self.component = ComponentSpec::Static(component.into());
        self
    }

    /// Named component slots.
    pub fn components<I, K, V>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ComponentId>,
    {
        self.component = ComponentSpec::Static(Components::named(slots));
        self
    }

    pub fn lazy_component<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoadContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Components, BoxError>> + Send + 'static,
    {
        self.component = ComponentSpec::Lazy(wrap_loader(loader));
        self
    }

    pub fn child(mut self, child: RouteBuilder) -> Self {
        match &mut self.children {
            ChildSpec::Static(children) => children.push(child),
            _ => self.children = ChildSpec::Static(vec![child]),
        }
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = RouteBuilder>) -> Self {
        for child in children {
            self = self.child(child);
        }
        self
    }

    /// Children produced on first use.
    pub fn lazy_children<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoadContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Arc<Route>>, BoxError>> + Send + 'static,
    {
        self.children = ChildSpec::Lazy(wrap_loader(loader));
        self
    }

    /// Route appended to the branch when this route consumes the whole path.
    pub fn index(mut self, index: RouteBuilder) -> Self {
        self.index = IndexSpec::Static(Box::new(index));
        self
    }

    pub fn lazy_index<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoadContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<Route>, BoxError>> + Send + 'static,
    {
        self.index = IndexSpec::Lazy(wrap_loader(loader));
        self
    }

    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_enter = Some(enter_hook(hook));
        self
    }

    pub fn on_enter_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_enter = Some(enter_hook_async(hook));
        self
    }

    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HookContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_change = Some(change_hook(hook));
        self
    }

    pub fn on_change_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_change = Some(change_hook_async(hook));
        self
    }

    /// Leave confirmation consulted before this route leaves the branch.
    pub fn on_leave<F, V>(mut self, hook: F) -> Self
    where
        F: Fn(&LeaveContext) -> V + Send + Sync + 'static,
        V: Into<LeaveVerdict>,
    {
        self.on_leave = Some(leave_hook(hook));
        self
    }

    pub fn on_leave_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(LeaveContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LeaveVerdict> + Send + 'static,
    {
        self.on_leave = Some(leave_hook_async(hook));
        self
    }

    /// Compile patterns and freeze the tree.
    pub fn build(self) -> Result<Arc<Route>, PatternError> {
        let path = self.path.as_deref().map(PathPattern::compile).transpose()?;

        let component = match self.component {
            ComponentSpec::None => None,
            ComponentSpec::Static(components) => Some(Lazy::ready(components)),
            ComponentSpec::Lazy(loader) => Some(Lazy::deferred(loader)),
        };

        let children = match self.children {
            ChildSpec::None => None,
            ChildSpec::Static(builders) => Some(Lazy::ready(
                builders
                    .into_iter()
                    .map(RouteBuilder::build)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            ChildSpec::Lazy(loader) => Some(Lazy::deferred(loader)),
        };

        let index_route = match self.index {
            IndexSpec::None => None,
            IndexSpec::Static(builder) => Some(Lazy::ready(builder.build()?)),
            IndexSpec::Lazy(loader) => Some(Lazy::deferred(loader)),
        };

        Ok(Arc::new(Route {
            id: RouteId::next(),
            name: self.name,
            path,
            component,
            children,
            index_route,
            on_enter: self.on_enter,
            on_change: self.on_change,
            on_leave: self.on_leave,
        }))
    }
}
