//! Lifecycle of subscriptions.
//!
//! # Data Flow
//! ```text
//! listen / subscribe / set_route_leave_hook
//!     → registers a callback with its owner
//!     → returns Unlisten (subscription.rs)
//!
//! Unlisten::unlisten()
//!     → runs the owner's teardown once
//!     → owner already gone: nothing happens
//! ```
//!
//! # Design Decisions
//! - Teardown is explicit, not tied to `Drop`
//! - Owners are captured weakly so handles never keep them alive

pub mod subscription;

pub use subscription::Unlisten;
