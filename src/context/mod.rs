//! State propagation to views.
//!
//! # Data Flow
//! ```text
//! transition published
//!     → ContextPublisher::notify() (event index + 1)
//!     → every subscriber callback gets the new index
//!     → ContextSubscriber::observe(index) decides whether to re-read the state handle
//! ```
//!
//! # Design Decisions
//! - One explicit channel keyed by a monotonic counter
//! - Subscribers re-read state through the handle, not through the event

pub mod publisher;

pub use publisher::{ContextListener, ContextPublisher, ContextSubscriber};
