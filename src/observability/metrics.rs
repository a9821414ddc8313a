//! Router metrics.
//!
//! # Metrics
//! - `router_transitions_total` (counter): finished transitions by outcome
//!   (`published`, `redirected`, `not_found`, `load_error`, `hook_error`,
//!   `redirect_limit`, `blocked`, `superseded`, `runtime_error`)
//! - `router_match_duration_seconds` (histogram): time spent resolving a branch
//! - `router_redirects_total` (counter): redirects issued by hooks
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; installing an exporter is up to the host
//! - Without a recorder every call is a no-op

use std::time::Duration;

use metrics::{counter, histogram};

/// How a transition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Published,
    Redirected,
    NotFound,
    LoadError,
    HookError,
    RedirectLimit,
    Blocked,
    Superseded,
    RuntimeError,
}

impl TransitionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Redirected => "redirected",
            Self::NotFound => "not_found",
            Self::LoadError => "load_error",
            Self::HookError => "hook_error",
            Self::RedirectLimit => "redirect_limit",
            Self::Blocked => "blocked",
            Self::Superseded => "superseded",
            Self::RuntimeError => "runtime_error",
        }
    }
}

pub fn record_transition(outcome: TransitionOutcome) {
    counter!("router_transitions_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_match_duration(elapsed: Duration) {
    histogram!("router_match_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_redirect() {
    counter!("router_redirects_total").increment(1);
}
