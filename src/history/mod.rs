//! Location sources.
//!
//! # Data Flow
//! ```text
//! push / replace / go
//!     → source updates its current entry
//!     → every listener receives the new Location (action PUSH/REPLACE/POP)
//!     → transition manager starts a match
//! ```
//!
//! # Design Decisions
//! - The router only depends on the `LocationSource` trait
//! - `MemoryHistory` is the bundled implementation (tests, non-browser hosts)
//! - Listeners are notified after the source's own state is updated, with no lock held

pub mod location;
pub mod memory;

use std::sync::Arc;

use crate::lifecycle::Unlisten;

pub use location::{Action, Location, LocationDescriptor};
pub use memory::MemoryHistory;

/// Callback invoked for each new location.
pub type LocationListener = Arc<dyn Fn(&Location) + Send + Sync>;

/// The external abstraction providing the current location and change notifications.
pub trait LocationSource: Send + Sync {
    /// The location the source currently points at.
    fn current_location(&self) -> Location;

    /// Register a listener for location changes.
    fn listen(&self, listener: LocationListener) -> Unlisten;

    /// Add a new entry and make it current.
    fn push(&self, location: LocationDescriptor);

    /// Overwrite the current entry.
    fn replace(&self, location: LocationDescriptor);

    /// Move `delta` entries through the stack.
    fn go(&self, delta: isize);

    /// Render a location as an href.
    fn create_href(&self, location: &LocationDescriptor) -> String;
}
