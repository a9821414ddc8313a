//! Router facade.
//!
//! # Responsibilities
//! - Own the transition manager and the context channel
//! - Expose navigation (`push`, `replace`, `go`, `go_back`, `go_forward`)
//! - Answer `is_active` and `create_href`, register route leave hooks
//! - Route transition errors to `on_error`, or to the log
//!
//! # Design Decisions
//! - `Router` is one `Arc`; its identity never changes, only the state behind it
//! - Setup problems fail fast in `build()` with a `ConfigError`

pub mod facade;

pub use facade::{ErrorHandler, Router, RouterBuilder, UpdateHandler};
