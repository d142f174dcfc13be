//! Typed event bus for engine lifecycle notifications.

use crate::engine::PassSummary;
use crate::monitor::NetworkState;
use offsync_protocol::{OfflineRecord, QueuedMutation, RemoteRecord};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A lifecycle event emitted by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The network transitioned between online and offline.
    NetworkChanged(NetworkState),
    /// A sync pass started.
    SyncStarted,
    /// A sync pass completed.
    SyncCompleted(PassSummary),
    /// A sync pass could not start or aborted mid-way.
    SyncFailed {
        /// Why the pass failed.
        reason: String,
    },
    /// A queue entry exhausted its retries and was dropped.
    SyncItemFailed {
        /// The dropped entry.
        mutation: QueuedMutation,
        /// The last transmission error.
        error: String,
    },
    /// Local and remote versions diverged under the manual policy.
    ConflictDetected {
        /// The local record, untouched.
        local: OfflineRecord,
        /// The remote counterpart.
        remote: RemoteRecord,
    },
    /// Records were evicted to enforce the storage budget.
    DataCleanup {
        /// Number of records removed.
        removed: usize,
    },
}

impl EngineEvent {
    /// Returns the kind tag used for subscription routing.
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::NetworkChanged(_) => EventKind::NetworkChanged,
            EngineEvent::SyncStarted => EventKind::SyncStarted,
            EngineEvent::SyncCompleted(_) => EventKind::SyncCompleted,
            EngineEvent::SyncFailed { .. } => EventKind::SyncFailed,
            EngineEvent::SyncItemFailed { .. } => EventKind::SyncItemFailed,
            EngineEvent::ConflictDetected { .. } => EventKind::ConflictDetected,
            EngineEvent::DataCleanup { .. } => EventKind::DataCleanup,
        }
    }
}

/// Kind tag of an [`EngineEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`EngineEvent::NetworkChanged`].
    NetworkChanged,
    /// See [`EngineEvent::SyncStarted`].
    SyncStarted,
    /// See [`EngineEvent::SyncCompleted`].
    SyncCompleted,
    /// See [`EngineEvent::SyncFailed`].
    SyncFailed,
    /// See [`EngineEvent::SyncItemFailed`].
    SyncItemFailed,
    /// See [`EngineEvent::ConflictDetected`].
    ConflictDetected,
    /// See [`EngineEvent::DataCleanup`].
    DataCleanup,
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Handler = dyn Fn(&EngineEvent) + Send + Sync;

/// A publish/subscribe bus with one subscriber list per event kind.
///
/// Handlers for a kind fire in subscription order. Each handler
/// invocation is isolated: a panicking handler cannot prevent later
/// handlers from running.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Arc<Handler>)>>>,
}

impl EventBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to an event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&EngineEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unsubscribes a handler. Returns whether it was subscribed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        match handlers.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|(sub_id, _)| *sub_id != id);
                list.len() != before
            }
            None => false,
        }
    }

    /// Emits an event to all subscribers of its kind, in subscription
    /// order.
    pub fn emit(&self, event: EngineEvent) {
        let subscribers: Vec<Arc<Handler>> = {
            let handlers = self.handlers.read();
            handlers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in subscribers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::warn!(kind = ?event.kind(), "event handler panicked");
            }
        }
    }

    /// Returns the number of subscribers for a kind.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .get(&kind)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn handlers_fire_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.on(EventKind::SyncStarted, move |_| order.lock().push(tag));
        }

        bus.emit(EngineEvent::SyncStarted);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn off_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let id = {
            let count = Arc::clone(&count);
            bus.on(EventKind::SyncStarted, move |_| *count.lock() += 1)
        };

        bus.emit(EngineEvent::SyncStarted);
        assert!(bus.off(EventKind::SyncStarted, id));
        bus.emit(EngineEvent::SyncStarted);

        assert_eq!(*count.lock(), 1);
        assert!(!bus.off(EventKind::SyncStarted, id));
    }

    #[test]
    fn kinds_are_independent() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        {
            let count = Arc::clone(&count);
            bus.on(EventKind::DataCleanup, move |_| *count.lock() += 1);
        }

        bus.emit(EngineEvent::SyncStarted);
        assert_eq!(*count.lock(), 0);

        bus.emit(EngineEvent::DataCleanup { removed: 3 });
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn panicking_handler_does_not_suppress_later_handlers() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.on(EventKind::SyncStarted, |_| panic!("handler bug"));
        {
            let reached = Arc::clone(&reached);
            bus.on(EventKind::SyncStarted, move |_| *reached.lock() = true);
        }

        bus.emit(EngineEvent::SyncStarted);
        assert!(*reached.lock());
    }

    #[test]
    fn handler_count() {
        let bus = EventBus::new();
        assert_eq!(bus.handler_count(EventKind::SyncCompleted), 0);
        bus.on(EventKind::SyncCompleted, |_| {});
        bus.on(EventKind::SyncCompleted, |_| {});
        assert_eq!(bus.handler_count(EventKind::SyncCompleted), 2);
    }
}
