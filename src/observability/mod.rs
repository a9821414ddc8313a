//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resolver and transition manager produce:
//!     → tracing events (start, match, publish, redirect, block, errors)
//!     → metrics.rs (transition outcomes, match latency, redirects)
//!
//! Host installs:
//!     → logging.rs (fmt subscriber with EnvFilter)
//!     → any `metrics` recorder it likes
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (pathname, route, generation)
//! - Metrics are cheap facade calls, no-ops without a recorder

pub mod logging;
pub mod metrics;
