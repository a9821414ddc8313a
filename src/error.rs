//! Error taxonomy for matching and transitions.
//!
//! # Design Decisions
//! - Errors reach the listener as values; nothing here is thrown
//! - A vetoed leave is not an error and has no variant
//! - Loader and hook failures keep their original error as the source

use thiserror::Error;

/// Boxed error returned by lazy loaders and transition hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced through the transition listener.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No route branch matches the pathname.
    #[error("no route matches `{pathname}`")]
    NotFound { pathname: String },

    /// A lazy loader for children, index route or component failed.
    #[error("failed to load {what} for route {route}: {source}")]
    Load {
        route: String,
        what: &'static str,
        #[source]
        source: BoxError,
    },

    /// An enter or change hook returned an error.
    #[error("hook on route {route} failed: {source}")]
    Hook {
        route: String,
        #[source]
        source: BoxError,
    },

    /// Enter/change hooks redirected more times than allowed.
    #[error("redirect chain exceeded {limit} hops at `{pathname}`")]
    RedirectLimit { limit: u32, pathname: String },

    /// A transition suspended but there is no runtime to finish it on.
    #[error("asynchronous route resolution requires a Tokio runtime")]
    Runtime,
}

/// Result type for routing operations.
pub type RouterResult<T> = Result<T, RouterError>;
