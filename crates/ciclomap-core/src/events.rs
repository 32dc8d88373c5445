//! Event infrastructure for the synchronization controller.
//!
//! Provides `SyncEvent` for UI notifications and `EventBus` for subscriptions.
//! The presentation layer listens here to recompute projections after a
//! snapshot and to surface a transient success/failure notice for each
//! mutation.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Mutations the controller can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    UpdateNotes,
    Delete,
}

/// Events emitted by the synchronization controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A snapshot replaced the authoritative list.
    SnapshotApplied {
        /// Annotations now in the list.
        count: usize,
        /// Documents dropped as malformed or duplicate.
        skipped: usize,
        /// Milliseconds since Unix epoch.
        timestamp: i64,
    },
    /// The subscription delivered an error; the previous list is kept.
    SnapshotFailed {
        error: String,
        timestamp: i64,
    },
    /// The store accepted a new annotation.
    AnnotationCreated {
        id: String,
        timestamp: i64,
    },
    /// The store accepted a notes edit.
    NotesUpdated {
        id: String,
        timestamp: i64,
    },
    /// The store removed an annotation.
    AnnotationDeleted {
        id: String,
        timestamp: i64,
    },
    /// A remote write failed. The user may retry.
    MutationFailed {
        operation: Operation,
        id: Option<String>,
        error: String,
        timestamp: i64,
    },
    /// A mutation was refused locally; nothing was sent to the store.
    MutationRejected {
        operation: Operation,
        id: Option<String>,
        reason: String,
        timestamp: i64,
    },
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Event bus for publishing sync events to subscribers.
///
/// Thread-safe: snapshots arrive on the store's thread while mutations run on
/// the caller's. Wrap in `Arc` to enable subscriptions.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    ///
    /// Requires `self` to be wrapped in `Arc`.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // emit() releases the read lock before invoking callbacks.
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(i, _)| *i != id);
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SyncEvent) {
        // Clone the callback list to prevent deadlock if a callback calls subscribe.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}
