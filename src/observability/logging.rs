//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Let `RUST_LOG` override the configured level
//!
//! # Design Decisions
//! - Library code only emits events; installing a subscriber is the host's call
//! - A second initialization is ignored instead of panicking

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a formatting subscriber filtered by `RUST_LOG`, else by `default_level`.
///
/// Returns `false` when a global subscriber was already set.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nested_router={}", default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_ignored() {
        init_logging("debug");
        assert!(!init_logging("info"));
    }
}
