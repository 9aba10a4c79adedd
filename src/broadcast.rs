//! # Broadcast Module
//!
//! Fans each received serial line out to zero or more registered listeners.
//!
//! The broadcaster is decoupled from the transport: listeners can attach and
//! detach at any time, including while a dispatch is running or from inside
//! their own callback, without touching the serial connection. A panicking
//! listener is isolated so it cannot break delivery to the others.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Callback invoked with each received line (terminator retained)
pub type LineCallback = dyn Fn(&str) + Send + Sync;

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, Arc<LineCallback>>,
}

/// Line fan-out with runtime subscribe/unsubscribe.
///
/// Cloning is cheap and all clones share the same subscriber set, so the
/// background reader and any number of foreground callers can hold one.
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Broadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle.
    ///
    /// Safe to call while a dispatch is in flight; the new listener starts
    /// receiving from the next dispatched line.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, Arc::new(callback));
        SubscriberId(id)
    }

    /// Removes a listener. Returns `false` if the handle was already gone.
    ///
    /// Removal during an in-flight dispatch does not affect lines already
    /// snapshotted for delivery.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.lock().unwrap().subscribers.remove(&id.0).is_some()
    }

    /// Number of currently registered listeners
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().unwrap().subscribers.len()
    }

    /// Delivers `line` to every currently subscribed listener.
    ///
    /// The subscriber set is snapshotted under a short lock and callbacks run
    /// outside it, so a slow callback cannot stall subscribe/unsubscribe and
    /// a callback may itself mutate the subscriber set. Dispatch order across
    /// listeners is unspecified; each listener sees lines in arrival order.
    pub fn dispatch(&self, line: &str) {
        let snapshot: Vec<Arc<LineCallback>> = {
            let registry = self.registry.lock().unwrap();
            registry.subscribers.values().cloned().collect()
        };

        for callback in snapshot {
            if catch_unwind(AssertUnwindSafe(|| callback(line))).is_err() {
                warn!("line listener panicked; continuing with remaining listeners");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispatch_reaches_all_subscribers() {
        let broadcaster = Broadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            broadcaster.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        broadcaster.dispatch("hello\n");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let broadcaster = Broadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = {
            let count = Arc::clone(&count);
            broadcaster.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        broadcaster.dispatch("one\n");
        assert!(broadcaster.unsubscribe(id));
        broadcaster.dispatch("two\n");

        assert_eq!(count.load(Ordering::SeqCst), 1);
        // Second removal of the same handle is a no-op
        assert!(!broadcaster.unsubscribe(id));
    }

    #[test]
    fn test_subscriber_sees_lines_in_order() {
        let broadcaster = Broadcaster::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        broadcaster.subscribe(move |line| {
            sink.lock().unwrap().push(line.to_string());
        });

        broadcaster.dispatch("a\n");
        broadcaster.dispatch("b\n");
        broadcaster.dispatch("c\n");

        assert_eq!(*seen.lock().unwrap(), vec!["a\n", "b\n", "c\n"]);
    }

    #[test]
    fn test_unsubscribe_from_own_callback() {
        let broadcaster = Broadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));
        let own_id: Arc<Mutex<Option<SubscriberId>>> = Arc::new(Mutex::new(None));

        let id = {
            let broadcaster = broadcaster.clone();
            let count = Arc::clone(&count);
            let own_id = Arc::clone(&own_id);
            broadcaster.clone().subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.lock().unwrap().take() {
                    broadcaster.unsubscribe(id);
                }
            })
        };
        *own_id.lock().unwrap() = Some(id);

        // First dispatch runs the callback once and removes it; the second
        // must not reach it again.
        broadcaster.dispatch("first\n");
        broadcaster.dispatch("second\n");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let broadcaster = Broadcaster::new();
        let count = Arc::new(AtomicUsize::new(0));

        broadcaster.subscribe(|_| panic!("bad listener"));
        {
            let count = Arc::clone(&count);
            broadcaster.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        broadcaster.subscribe(|_| panic!("another bad listener"));

        broadcaster.dispatch("line\n");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_during_dispatch_takes_effect_next_line() {
        let broadcaster = Broadcaster::new();
        let late_count = Arc::new(AtomicUsize::new(0));

        {
            let broadcaster_inner = broadcaster.clone();
            let late_count = Arc::clone(&late_count);
            let registered = Arc::new(AtomicUsize::new(0));
            broadcaster.subscribe(move |_| {
                if registered.fetch_add(1, Ordering::SeqCst) == 0 {
                    let late_count = Arc::clone(&late_count);
                    broadcaster_inner.subscribe(move |_| {
                        late_count.fetch_add(1, Ordering::SeqCst);
                    });
                }
            });
        }

        broadcaster.dispatch("first\n");
        assert_eq!(late_count.load(Ordering::SeqCst), 0);
        broadcaster.dispatch("second\n");
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }
}
