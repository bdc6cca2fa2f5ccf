//! Subscriber identity and mailbox types
//!
//! Each subscriber owns a single-slot mailbox. The registry keeps the
//! sending half; the waiting caller holds the receiving half.

use std::fmt;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::message::Message;

/// Number of undelivered messages a mailbox can hold
pub const MAILBOX_CAPACITY: usize = 1;

/// Opaque registration token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(super) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Numeric value, for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of offering a message to one mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message placed in the mailbox
    Delivered,
    /// Mailbox still holds an unread message
    Full,
    /// Subscriber stopped waiting
    Closed,
}

/// Sending side of a subscriber's mailbox
///
/// Cloned into registry snapshots so that a broadcast can proceed without
/// holding the registry lock.
#[derive(Debug, Clone)]
pub struct Mailbox {
    id: SubscriberId,
    tx: mpsc::Sender<Message>,
    registered_at: Instant,
}

impl Mailbox {
    /// Create a mailbox and its receiving half
    pub(super) fn channel(id: SubscriberId) -> (Self, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let mailbox = Self {
            id,
            tx,
            registered_at: Instant::now(),
        };
        (mailbox, rx)
    }

    /// Owner of this mailbox
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// When the owner registered
    pub fn registered_at(&self) -> Instant {
        self.registered_at
    }

    /// Try to place a message without waiting
    pub fn offer(&self, message: Message) -> Delivery {
        match self.tx.try_send(message) {
            Ok(()) => Delivery::Delivered,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
