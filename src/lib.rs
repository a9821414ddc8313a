//! Nested route matching and transition engine.
//!
//! # Architecture Overview
//!
//! ```text
//!   LocationSource (history)            Router (facade)
//!        │  push / replace / go  ◀──────────┤
//!        │                                  │ start / stop / is_active
//!        ▼ location event                   ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ transition::TransitionManager                            │
//!   │   generation bump (supersede)                            │
//!   │   → routing::Resolver ── routing::PathPattern            │
//!   │        (lazy children / index routes / components)       │
//!   │   → leave confirmation, change hooks, enter hooks        │
//!   │   → StateHandle::store(RouterState)                      │
//!   └──────────────────────────────┬───────────────────────────┘
//!                                  ▼
//!                   listener → on_update / on_error
//!                                  ▼
//!                   context::ContextPublisher::notify()
//! ```

// Matching
pub mod error;
pub mod routing;

// Transitions
pub mod history;
pub mod transition;

// Public surface
pub mod context;
pub mod router;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::RouterConfig;
pub use error::{BoxError, RouterError, RouterResult};
pub use history::{Action, Location, LocationDescriptor, LocationSource, MemoryHistory};
pub use lifecycle::Unlisten;
pub use router::{Router, RouterBuilder};
pub use routing::{Components, Params, PathPattern, Route, RouteBuilder};
pub use transition::{HookContext, LeaveContext, LeaveVerdict, RouterState};
