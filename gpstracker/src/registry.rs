//! Subscriber bookkeeping and ordered fan-out.
//!
//! # Delivery guarantees
//!
//! - every event reaches each subscriber that was registered when
//!   [`notify`](SubscriptionRegistry::notify) was called, exactly once
//! - events are delivered in global `notify` order, for all subscribers
//! - a subscriber added during a delivery does not see the in-flight event
//! - a subscriber removed (even from inside its own handler) sees nothing
//!   after the removal
//!
//! # Design
//!
//! `notify` appends `(event, snapshot of subscribers)` to a queue. The first
//! caller becomes the drainer and delivers queued entries until the queue is
//! empty; re-entrant or concurrent callers only enqueue. The lock is never
//! held while a handler runs, so handlers may subscribe, unsubscribe or
//! trigger further events freely. Removal flips a per-subscriber flag that
//! is checked right before each delivery.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::channel::EventChannel;
use crate::event::TrackingEvent;

/// Opaque subscription token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Public view of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub created_at: DateTime<Utc>,
}

struct Subscriber {
    subscription: Subscription,
    channel: Box<dyn EventChannel>,
    active: AtomicBool,
}

struct Pending {
    event: TrackingEvent,
    recipients: Vec<Arc<Subscriber>>,
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Arc<Subscriber>>,
    queue: VecDeque<Pending>,
    draining: bool,
}

/// Owner of the subscriber list.
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    handler_panics: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
            handler_panics: AtomicU64::new(0),
        }
    }

    /// Register a channel; it receives every event notified from now on.
    pub fn subscribe(&self, channel: impl EventChannel) -> SubscriptionId {
        self.subscribe_boxed(Box::new(channel))
    }

    pub fn subscribe_boxed(&self, channel: Box<dyn EventChannel>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Arc::new(Subscriber {
            subscription: Subscription {
                id,
                created_at: Utc::now(),
            },
            channel,
            active: AtomicBool::new(true),
        });

        self.inner.lock().subscribers.push(subscriber);
        debug!(subscription = %id, "Subscribed");
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    ///
    /// Returns whether the id was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let index = inner
                .subscribers
                .iter()
                .position(|s| s.subscription.id == id);
            index.map(|index| inner.subscribers.remove(index))
        };

        match removed {
            Some(subscriber) => {
                subscriber.active.store(false, Ordering::Release);
                debug!(subscription = %id, "Unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.lock().subscribers);
        for subscriber in &removed {
            subscriber.active.store(false, Ordering::Release);
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), "Cleared subscriptions");
        }
    }

    /// Deliver `event` to every current subscriber.
    pub fn notify(&self, event: TrackingEvent) {
        {
            let mut inner = self.inner.lock();
            let recipients = inner.subscribers.clone();
            inner.queue.push_back(Pending { event, recipients });
            if inner.draining {
                return;
            }
            inner.draining = true;
        }

        loop {
            let next = {
                let mut inner = self.inner.lock();
                match inner.queue.pop_front() {
                    Some(pending) => pending,
                    None => {
                        inner.draining = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, pending: Pending) {
        let Pending { event, recipients } = pending;
        for subscriber in recipients {
            if !subscriber.active.load(Ordering::Acquire) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| subscriber.channel.deliver(&event)));
            if result.is_err() {
                self.handler_panics.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subscription = %subscriber.subscription.id,
                    event = event.name(),
                    "Subscriber handler panicked, continuing delivery"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().subscribers.is_empty()
    }

    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.inner
            .lock()
            .subscribers
            .iter()
            .any(|s| s.subscription.id == id)
    }

    /// Registered subscriptions, oldest first.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.inner
            .lock()
            .subscribers
            .iter()
            .map(|s| s.subscription)
            .collect()
    }

    /// Number of handler panics caught so far.
    pub fn handler_panics(&self) -> u64 {
        self.handler_panics.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ErrorKind;
    use crate::state::TrackerState;
    use std::sync::OnceLock;

    fn state(state: TrackerState) -> TrackingEvent {
        TrackingEvent::StateChanged(state)
    }

    fn recorder() -> (
        impl Fn(&TrackingEvent) + Send + Sync + 'static,
        Arc<Mutex<Vec<TrackingEvent>>>,
    ) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = Arc::clone(&seen);
            move |event: &TrackingEvent| seen.lock().push(event.clone())
        };
        (handler, seen)
    }

    #[test]
    fn test_delivers_to_all_subscribers_in_order() {
        let registry = SubscriptionRegistry::new();
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        registry.subscribe(a);
        registry.subscribe(b);

        registry.notify(state(TrackerState::Starting));
        registry.notify(state(TrackerState::Active));
        registry.notify(TrackingEvent::error(ErrorKind::Timeout, "slow"));

        assert_eq!(seen_a.lock().len(), 3);
        assert_eq!(*seen_a.lock(), *seen_b.lock());
    }

    #[test]
    fn test_ids_are_unique() {
        let registry = SubscriptionRegistry::new();
        let first = registry.subscribe(|_: &TrackingEvent| {});
        let second = registry.subscribe(|_: &TrackingEvent| {});
        assert_ne!(first, second);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry
                .subscriptions()
                .iter()
                .map(|s| s.id)
                .collect::<Vec<_>>(),
            vec![first, second]
        );
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let registry = SubscriptionRegistry::new();
        let id = registry.subscribe(|_: &TrackingEvent| {});
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_self_unsubscribe_stops_delivery() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let own_id: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        let count = Arc::new(AtomicU64::new(0));

        let id = {
            let registry_ref = Arc::clone(&registry);
            let own_id = Arc::clone(&own_id);
            let count = Arc::clone(&count);
            registry.subscribe(move |_: &TrackingEvent| {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.get() {
                    registry_ref.unsubscribe(*id);
                }
            })
        };
        own_id.set(id).unwrap();

        registry.notify(state(TrackerState::Starting));
        registry.notify(state(TrackerState::Active));
        registry.notify(state(TrackerState::Stopped));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removed_mid_delivery_gets_nothing_more() {
        // First subscriber removes the second while the same event is in flight
        let registry = Arc::new(SubscriptionRegistry::new());
        let victim: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        {
            let registry_ref = Arc::clone(&registry);
            let victim = Arc::clone(&victim);
            registry.subscribe(move |_: &TrackingEvent| {
                if let Some(id) = victim.get() {
                    registry_ref.unsubscribe(*id);
                }
            });
        }
        let (b, seen_b) = recorder();
        victim.set(registry.subscribe(b)).unwrap();

        registry.notify(state(TrackerState::Active));
        registry.notify(state(TrackerState::Stopped));

        assert!(seen_b.lock().is_empty());
    }

    #[test]
    fn test_subscriber_added_during_delivery_misses_inflight_event() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (late, seen_late) = recorder();
        let late = Arc::new(Mutex::new(Some(late)));
        {
            let registry_ref = Arc::clone(&registry);
            registry.subscribe(move |_: &TrackingEvent| {
                if let Some(handler) = late.lock().take() {
                    registry_ref.subscribe(handler);
                }
            });
        }

        registry.notify(state(TrackerState::Starting));
        assert!(seen_late.lock().is_empty());

        registry.notify(state(TrackerState::Active));
        assert_eq!(*seen_late.lock(), vec![state(TrackerState::Active)]);
    }

    #[test]
    fn test_reentrant_notify_is_queued_not_interleaved() {
        let registry = Arc::new(SubscriptionRegistry::new());
        {
            let registry_ref = Arc::clone(&registry);
            registry.subscribe(move |event: &TrackingEvent| {
                if *event == state(TrackerState::Starting) {
                    registry_ref.notify(state(TrackerState::Active));
                }
            });
        }
        let (b, seen_b) = recorder();
        registry.subscribe(b);

        registry.notify(state(TrackerState::Starting));
        registry.notify(state(TrackerState::Stopped));

        // b sees Starting before the nested Active, never interleaved
        assert_eq!(
            *seen_b.lock(),
            vec![
                state(TrackerState::Starting),
                state(TrackerState::Active),
                state(TrackerState::Stopped),
            ]
        );
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let registry = SubscriptionRegistry::new();
        registry.subscribe(|_: &TrackingEvent| panic!("handler bug"));
        let (b, seen_b) = recorder();
        registry.subscribe(b);

        registry.notify(state(TrackerState::Active));
        registry.notify(state(TrackerState::Stopped));

        assert_eq!(seen_b.lock().len(), 2);
        assert_eq!(registry.handler_panics(), 2);
    }

    #[test]
    fn test_clear_removes_everyone() {
        let registry = SubscriptionRegistry::new();
        let (a, seen_a) = recorder();
        registry.subscribe(a);
        registry.clear();

        registry.notify(state(TrackerState::Active));
        assert!(seen_a.lock().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_notify_keeps_identical_order() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        registry.subscribe(a);
        registry.subscribe(b);

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry.notify(TrackingEvent::error(
                            ErrorKind::Platform(t * 100 + i),
                            "burst",
                        ));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(seen_a.lock().len(), 200);
        assert_eq!(*seen_a.lock(), *seen_b.lock());
    }
}
