//! Subscriber registry implementation
//!
//! The set of subscribers currently parked in a long poll. Only subscribers
//! present here receive broadcasts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::entry::{Mailbox, SubscriberId};
use super::handle::SubscriberHandle;

/// Live set of waiting subscribers
///
/// Guarded by a synchronous mutex held only for a single insert, remove or
/// copy. The lock must be synchronous: [`SubscriberHandle`] unregisters from
/// `Drop` when a wait is cancelled.
///
/// There is no cap on the number of live subscribers. Every registration is
/// released when its handle is dropped, so growth is bounded by the number
/// of concurrently outstanding handles.
pub struct SubscriberRegistry {
    /// Keyed by id; ids increase monotonically so iteration follows
    /// registration order
    subscribers: Mutex<BTreeMap<SubscriberId, Mailbox>>,

    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<SubscriberId, Mailbox>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber with an empty mailbox
    pub fn register(self: &Arc<Self>) -> SubscriberHandle {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (mailbox, rx) = Mailbox::channel(id);

        let live = {
            let mut subscribers = self.lock();
            subscribers.insert(id, mailbox);
            subscribers.len()
        };

        tracing::trace!(subscriber = %id, live = live, "Subscriber registered");

        SubscriberHandle::new(id, rx, Arc::clone(self))
    }

    /// Remove a subscriber
    ///
    /// Idempotent. Returns `true` if an entry was removed by this call.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, live) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id);
            (removed, subscribers.len())
        };

        match removed {
            Some(mailbox) => {
                tracing::trace!(
                    subscriber = %id,
                    live = live,
                    held_ms = mailbox.registered_at().elapsed().as_millis() as u64,
                    "Subscriber unregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Copy of the live set at this instant
    ///
    /// Later registrations and removals do not affect the returned list.
    pub fn snapshot(&self) -> Vec<Mailbox> {
        self.lock().values().cloned().collect()
    }

    /// Whether `id` is currently registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Number of live subscribers
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no subscriber is waiting
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
