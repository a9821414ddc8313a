//! Transition subsystem.
//!
//! # Data Flow
//! ```text
//! location event
//!     → manager.rs (generation bump, resolve via routing::Resolver)
//!     → hooks.rs (leaving deepest first, changing and entering root first)
//!     → state.rs (store the new RouterState in the shared handle)
//!     → listener(Ok(state)) or listener(Err(error))
//! ```
//!
//! # Design Decisions
//! - Last request wins; there is no queue of pending transitions
//! - A vetoed leave is silent: no publish and no error
//! - State is swapped as a whole, readers go through the handle

pub mod hooks;
pub mod manager;
pub mod state;

pub use hooks::{
    ChangeHook, ChangedRoutes, EnterHook, HookContext, LeaveContext, LeaveHook, LeaveVerdict,
};
pub use manager::{TransitionListener, TransitionManager, UserConfirmation};
pub use state::{RouterState, StateHandle};
