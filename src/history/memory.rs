//! In-memory location source.
//!
//! # Responsibilities
//! - Keep a stack of entries and a current index
//! - Truncate forward entries on push
//! - Emit POP locations when moving through the stack
//! - Notify listeners synchronously after each change

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::history::location::{Action, Location, LocationDescriptor};
use crate::history::{LocationListener, LocationSource};
use crate::lifecycle::Unlisten;

type ListenerList = Arc<Mutex<Vec<(u64, LocationListener)>>>;

struct EntryStack {
    entries: Vec<Location>,
    index: usize,
}

/// A location source backed by a vector of entries.
pub struct MemoryHistory {
    stack: Mutex<EntryStack>,
    listeners: ListenerList,
    basename: String,
    next_listener_id: AtomicU64,
    next_key: AtomicU64,
}

impl MemoryHistory {
    /// Create a history with a single entry.
    pub fn new(initial: impl Into<LocationDescriptor>) -> Self {
        Self::with_entries(vec![initial.into()], 0)
    }

    /// Create a history from several entries, positioned at `index` (clamped).
    pub fn with_entries(entries: Vec<LocationDescriptor>, index: usize) -> Self {
        let next_key = AtomicU64::new(0);
        let mut entries: Vec<Location> = entries
            .into_iter()
            .map(|d| Location::new(d, Action::Pop, make_key(&next_key)))
            .collect();
        if entries.is_empty() {
            entries.push(Location::new(
                LocationDescriptor::parse("/"),
                Action::Pop,
                make_key(&next_key),
            ));
        }
        let index = index.min(entries.len() - 1);

        Self {
            stack: Mutex::new(EntryStack { entries, index }),
            listeners: Arc::new(Mutex::new(Vec::new())),
            basename: String::new(),
            next_listener_id: AtomicU64::new(0),
            next_key,
        }
    }

    /// Prefix every href with `basename`.
    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        let basename = basename.into();
        self.basename = basename.trim_end_matches('/').to_string();
        self
    }

    /// Snapshot of all entries.
    pub fn entries(&self) -> Vec<Location> {
        self.lock_stack().entries.clone()
    }

    /// Position of the current entry.
    pub fn index(&self) -> usize {
        self.lock_stack().index
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_stack(&self) -> std::sync::MutexGuard<'_, EntryStack> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, location: &Location) {
        let listeners: Vec<LocationListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(location);
        }
    }
}

impl LocationSource for MemoryHistory {
    fn current_location(&self) -> Location {
        let stack = self.lock_stack();
        stack.entries[stack.index].clone()
    }

    fn listen(&self, listener: LocationListener) -> Unlisten {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));

        let listeners = Arc::downgrade(&self.listeners);
        Unlisten::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(entry, _)| *entry != id);
            }
        })
    }

    fn push(&self, location: LocationDescriptor) {
        let location = Location::new(location, Action::Push, make_key(&self.next_key));
        {
            let mut stack = self.lock_stack();
            let keep = stack.index + 1;
            stack.entries.truncate(keep);
            stack.entries.push(location.clone());
            stack.index = keep;
        }
        tracing::trace!(path = %location.path(), "memory history push");
        self.notify(&location);
    }

    fn replace(&self, location: LocationDescriptor) {
        let location = Location::new(location, Action::Replace, make_key(&self.next_key));
        {
            let mut stack = self.lock_stack();
            let index = stack.index;
            stack.entries[index] = location.clone();
        }
        tracing::trace!(path = %location.path(), "memory history replace");
        self.notify(&location);
    }

    fn go(&self, delta: isize) {
        let location = {
            let mut stack = self.lock_stack();
            let Some(index) = target_index(stack.index, delta, stack.entries.len()) else {
                tracing::warn!(delta, "Cannot go({}); there is not enough history", delta);
                return;
            };
            stack.index = index;
            stack.entries[index].action = Action::Pop;
            stack.entries[index].clone()
        };
        self.notify(&location);
    }

    fn create_href(&self, location: &LocationDescriptor) -> String {
        format!("{}{}", self.basename, location.path())
    }
}

fn target_index(index: usize, delta: isize, len: usize) -> Option<usize> {
    let target = index as isize + delta;
    if target < 0 || target >= len as isize {
        None
    } else {
        Some(target as usize)
    }
}

fn make_key(counter: &AtomicU64) -> String {
    format!("{:06x}", counter.fetch_add(1, Ordering::Relaxed) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(history: &MemoryHistory) -> (Arc<Mutex<Vec<Location>>>, Unlisten) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let unlisten = history.listen(Arc::new(move |location: &Location| {
            sink.lock().unwrap().push(location.clone());
        }));
        (seen, unlisten)
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new("/");
        history.push("/a".into());
        history.push("/b".into());
        history.go(-1);
        assert_eq!(history.current_location().pathname, "/a");

        history.push("/c".into());
        let paths: Vec<_> = history.entries().iter().map(|l| l.pathname.clone()).collect();
        assert_eq!(paths, vec!["/", "/a", "/c"]);
        assert_eq!(history.index(), 2);
    }

    #[test]
    fn test_replace_overwrites_current() {
        let history = MemoryHistory::new("/");
        history.push("/a".into());
        history.replace("/b".into());

        let paths: Vec<_> = history.entries().iter().map(|l| l.pathname.clone()).collect();
        assert_eq!(paths, vec!["/", "/b"]);
        assert_eq!(history.current_location().action, Action::Replace);
    }

    #[test]
    fn test_listeners_receive_actions() {
        let history = MemoryHistory::new("/");
        let (seen, unlisten) = recorder(&history);

        history.push("/a".into());
        history.go(-1);
        history.replace("/b".into());

        let actions: Vec<_> = seen.lock().unwrap().iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![Action::Push, Action::Pop, Action::Replace]);

        unlisten.unlisten();
        history.push("/c".into());
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(history.listener_count(), 0);
    }

    #[test]
    fn test_go_out_of_range_is_ignored() {
        let history = MemoryHistory::new("/");
        let (seen, _unlisten) = recorder(&history);

        history.go(-1);
        history.go(3);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(history.current_location().pathname, "/");
    }

    #[test]
    fn test_keys_are_unique() {
        let history = MemoryHistory::new("/");
        history.push("/a".into());
        history.push("/a".into());
        let entries = history.entries();
        assert_ne!(entries[1].key, entries[2].key);
    }

    #[test]
    fn test_create_href_with_basename() {
        let history = MemoryHistory::new("/").with_basename("/app/");
        assert_eq!(history.create_href(&"/users?id=1".into()), "/app/users?id=1");
    }
}
