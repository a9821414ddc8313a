//! Subscription teardown handles.

use std::fmt;
use std::sync::{Mutex, PoisonError};

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle returned by every `listen`/`subscribe` call.
///
/// Calling [`Unlisten::unlisten`] runs the teardown at most once; later calls
/// are no-ops. Dropping the handle does not unsubscribe.
pub struct Unlisten {
    teardown: Mutex<Option<Teardown>>,
}

impl Unlisten {
    /// Create a handle that runs `teardown` on the first `unlisten`.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Remove the subscription. Idempotent.
    pub fn unlisten(&self) {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// True until `unlisten` has run.
    pub fn is_active(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlisten")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_unlisten_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let handle = Unlisten::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.is_active());
        handle.unlisten();
        handle.unlisten();
        handle.unlisten();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }
}
