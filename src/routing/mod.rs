//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route configuration (at setup):
//!     RouteBuilder tree
//!     → pattern.rs (compile every path template once)
//!     → route.rs (freeze as Arc<Route>, lazy parts in once-cells)
//!
//! Location change:
//!     pathname
//!     → resolver.rs (depth-first walk, lazy loads, params merge)
//!     → MatchResult { routes, params, components } or NotFound
//!
//! Active links:
//!     candidate location + current branch
//!     → active.rs
//! ```
//!
//! # Design Decisions
//! - Route trees are immutable apart from memoized lazy values
//! - Deterministic: same tree and pathname always yield the same branch
//! - Declaration order is the only tie-break, there is no specificity scoring

pub mod active;
pub mod pattern;
pub mod resolver;
pub mod route;

use std::collections::BTreeMap;

pub use pattern::{PathPattern, PatternError, PatternMatch};
pub use resolver::{MatchResult, Resolver};
pub use route::{ComponentId, Components, LoadContext, Route, RouteBuilder, RouteId};

/// Merged path parameters of a branch.
pub type Params = BTreeMap<String, String>;
