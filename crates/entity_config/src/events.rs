//! After-update notifications.
//!
//! Every committed write (default, per-prefix default, or per-entity) emits
//! exactly one [`AfterUpdateEvent`] through an [`UpdateNotifier`]. Listeners
//! run synchronously on the writing task, after the store has acknowledged
//! the write. A listener cannot undo or fail the write: a panicking listener
//! is logged and skipped.
//!
//! # Examples
//!
//! ```rust
//! use entity_config::{AfterUpdateEvent, UpdateNotifier};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let notifier = UpdateNotifier::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = seen.clone();
//! notifier.subscribe(move |_event: &AfterUpdateEvent| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//! assert_eq!(notifier.listener_count(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

use crate::key::DocumentKey;
use crate::operation::UpdateOperation;
use crate::store::WriteResult;

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

/// Event emitted after a committed configuration write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AfterUpdateEvent {
    /// Unique identifier for this event (UUID v4).
    pub event_id: Uuid,

    /// When the write was acknowledged.
    pub timestamp: DateTime<Utc>,

    /// Acting user, if one could be determined.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,

    /// Key of the written document.
    #[serde(rename = "_id")]
    pub key: DocumentKey,

    /// The exact operation applied to the store.
    pub modifier: UpdateOperation,

    /// The raw store result.
    pub result: WriteResult,
}

impl AfterUpdateEvent {
    pub fn new(
        user_id: Option<String>,
        key: DocumentKey,
        modifier: UpdateOperation,
        result: WriteResult,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id,
            key,
            modifier,
            result,
        }
    }
}

/// Receives after-update events.
pub trait UpdateListener: Send + Sync {
    fn on_update(&self, event: &AfterUpdateEvent);
}

impl<F> UpdateListener for F
where
    F: Fn(&AfterUpdateEvent) + Send + Sync,
{
    fn on_update(&self, event: &AfterUpdateEvent) {
        self(event)
    }
}

/// Handle returned by [`UpdateNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Registration {
    id: ListenerId,
    once: bool,
    listener: Arc<dyn UpdateListener>,
}

/// Process-scoped fan-out of after-update events.
#[derive(Default)]
pub struct UpdateNotifier {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl UpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every subsequent event.
    pub fn subscribe<L>(&self, listener: L) -> ListenerId
    where
        L: UpdateListener + 'static,
    {
        self.register(Arc::new(listener), false)
    }

    /// Registers a listener for the next event only.
    pub fn subscribe_once<L>(&self, listener: L) -> ListenerId
    where
        L: UpdateListener + 'static,
    {
        self.register(Arc::new(listener), true)
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Delivers `event` to every listener and returns how many completed.
    ///
    /// One-shot listeners are removed before delivery. The listener list is
    /// not locked while listeners run, so a listener may subscribe or
    /// unsubscribe.
    pub fn emit(&self, event: &AfterUpdateEvent) -> usize {
        let snapshot: Vec<(ListenerId, Arc<dyn UpdateListener>)> = {
            let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
            let snapshot = listeners
                .iter()
                .map(|registration| (registration.id, registration.listener.clone()))
                .collect();
            listeners.retain(|registration| !registration.once);
            snapshot
        };

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_update(event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    error!(
                        listener = %id,
                        key = %event.key,
                        "After-update listener panicked; the write remains committed"
                    );
                }
            }
        }

        debug!(key = %event.key, delivered, "Emitted after-update event");
        delivered
    }

    fn register(&self, listener: Arc<dyn UpdateListener>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, once, listener });
        id
    }
}

impl fmt::Debug for UpdateNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
