//! Event-indexed publish/subscribe.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::lifecycle::Unlisten;

/// Called with the new event index after every notification.
pub type ContextListener = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Default)]
struct Channel {
    event_index: AtomicU64,
    listeners: Mutex<Vec<(u64, ContextListener)>>,
    next_id: AtomicU64,
}

/// Producer side. Clones share the same channel.
#[derive(Clone, Default)]
pub struct ContextPublisher {
    channel: Arc<Channel>,
}

impl ContextPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the latest notification; 0 before the first.
    pub fn event_index(&self) -> u64 {
        self.channel.event_index.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.channel
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Register `listener`. The handle stays valid after the publisher is dropped.
    pub fn subscribe(&self, listener: impl Fn(u64) + Send + Sync + 'static) -> Unlisten {
        let id = self.channel.next_id.fetch_add(1, Ordering::Relaxed);
        self.channel
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        let channel = Arc::downgrade(&self.channel);
        Unlisten::new(move || {
            if let Some(channel) = channel.upgrade() {
                channel
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Bump the event index and call every listener with it.
    pub fn notify(&self) -> u64 {
        let index = self.channel.event_index.fetch_add(1, Ordering::SeqCst) + 1;
        let listeners: Vec<ContextListener> = self
            .channel
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::trace!(index, listeners = listeners.len(), "Context notify");
        for listener in listeners {
            listener(index);
        }
        index
    }
}

impl fmt::Debug for ContextPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPublisher")
            .field("event_index", &self.event_index())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Consumer side: remembers the last event index it acted on.
#[derive(Debug, Clone, Default)]
pub struct ContextSubscriber {
    last_seen: Arc<AtomicU64>,
}

impl ContextSubscriber {
    /// Start at the publisher's current index, so only later events count.
    pub fn new(publisher: &ContextPublisher) -> Self {
        Self {
            last_seen: Arc::new(AtomicU64::new(publisher.event_index())),
        }
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen.load(Ordering::SeqCst)
    }

    /// Record `index`. True when it is newer than anything seen before.
    pub fn observe(&self, index: u64) -> bool {
        self.last_seen.fetch_max(index, Ordering::SeqCst) < index
    }

    /// True when the publisher has moved past what this subscriber saw.
    pub fn is_stale(&self, publisher: &ContextPublisher) -> bool {
        publisher.event_index() > self.last_seen()
    }

    /// Subscribe and call `on_change` only for events this subscriber has not seen.
    pub fn attach(
        &self,
        publisher: &ContextPublisher,
        on_change: impl Fn(u64) + Send + Sync + 'static,
    ) -> Unlisten {
        let subscriber = self.clone();
        publisher.subscribe(move |index| {
            if subscriber.observe(index) {
                on_change(index);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_increments_and_calls_listeners() {
        let publisher = ContextPublisher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _unlisten = publisher.subscribe(move |index| sink.lock().unwrap().push(index));

        assert_eq!(publisher.notify(), 1);
        assert_eq!(publisher.notify(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(publisher.event_index(), 2);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let publisher = ContextPublisher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let (a, b) = (calls.clone(), calls.clone());
        let first = publisher.subscribe(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let _second = publisher.subscribe(move |_| {
            b.fetch_add(10, Ordering::SeqCst);
        });

        first.unlisten();
        first.unlisten();
        publisher.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(publisher.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_publisher_dropped() {
        let publisher = ContextPublisher::new();
        let unlisten = publisher.subscribe(|_| {});
        drop(publisher);
        unlisten.unlisten();
        assert!(!unlisten.is_active());
    }

    #[test]
    fn test_subscriber_skips_seen_events() {
        let publisher = ContextPublisher::new();
        publisher.notify();

        let subscriber = ContextSubscriber::new(&publisher);
        assert_eq!(subscriber.last_seen(), 1);
        assert!(!subscriber.is_stale(&publisher));

        let renders = Arc::new(AtomicUsize::new(0));
        let counter = renders.clone();
        let _unlisten = subscriber.attach(&publisher, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.notify();
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert!(!subscriber.observe(2));
        assert!(subscriber.observe(5));
        assert!(!subscriber.observe(3));
        assert_eq!(subscriber.last_seen(), 5);
    }
}
