//! Published router state.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::history::Location;
use crate::routing::route::{Components, Route};
use crate::routing::Params;

/// The outcome of a completed transition.
#[derive(Debug, Clone, Serialize)]
pub struct RouterState {
    pub location: Location,
    /// Matched branch, root first.
    #[serde(serialize_with = "serialize_branch")]
    pub routes: Vec<Arc<Route>>,
    pub params: Params,
    /// Loaded components, aligned with `routes`.
    pub components: Vec<Option<Components>>,
}

impl RouterState {
    /// True when `route` is part of the branch.
    pub fn contains(&self, route: &Route) -> bool {
        self.routes.iter().any(|candidate| candidate.id() == route.id())
    }

    /// Deepest matched route.
    pub fn leaf(&self) -> Option<&Arc<Route>> {
        self.routes.last()
    }
}

fn serialize_branch<S: serde::Serializer>(
    routes: &[Arc<Route>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(routes.iter().map(|route| route.label()))
}

/// Lock-free handle to the currently published state.
///
/// Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct StateHandle(Arc<ArcSwapOption<RouterState>>);

impl StateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<RouterState>> {
        self.0.load_full()
    }

    pub fn store(&self, state: Arc<RouterState>) {
        self.0.store(Some(state));
    }

    /// True when both handles point at the same slot.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateHandle").field(&self.load()).finish()
    }
}
