//! Subscriber handle
//!
//! The receiving side of a registration. Dropping the handle unregisters
//! the subscriber, so a wait that is abandoned halfway (the client hung up)
//! never leaks an entry.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::entry::SubscriberId;
use super::message::Message;
use super::store::SubscriberRegistry;

/// A single registration in the [`SubscriberRegistry`]
///
/// Unregisters itself exactly once: on [`release`](Self::release) or on
/// drop, whichever comes first.
pub struct SubscriberHandle {
    id: SubscriberId,
    mailbox: mpsc::Receiver<Message>,
    registry: Arc<SubscriberRegistry>,
    released: bool,
}

impl SubscriberHandle {
    pub(super) fn new(
        id: SubscriberId,
        mailbox: mpsc::Receiver<Message>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        Self {
            id,
            mailbox,
            registry,
            released: false,
        }
    }

    /// Registration token
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the registry still lists this subscriber
    pub fn is_registered(&self) -> bool {
        !self.released && self.registry.contains(self.id)
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the registration is gone and the mailbox is empty.
    pub async fn recv(&mut self) -> Option<Message> {
        self.mailbox.recv().await
    }

    /// Take a pending message without waiting
    pub fn try_recv(&mut self) -> Option<Message> {
        self.mailbox.try_recv().ok()
    }

    /// Leave the registry and close the mailbox
    ///
    /// A message delivered before the close stays readable through
    /// [`try_recv`](Self::try_recv).
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.mailbox.close();
        self.registry.unregister(self.id);
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}
