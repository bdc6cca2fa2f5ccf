//! Subscriber registry
//!
//! Tracks the subscribers that are currently parked in a long poll. Each
//! registration owns a single-slot mailbox; the registry keeps the sending
//! side so that a broadcast can reach every live subscriber.
//!
//! # Architecture
//!
//! ```text
//!                    Arc<SubscriberRegistry>
//!               ┌──────────────────────────────┐
//!               │ subscribers: BTreeMap<Id,    │
//!               │   Mailbox { tx (cap = 1) }   │
//!               │ >                            │
//!               └──────────────┬───────────────┘
//!                              │ snapshot()
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    [Mailbox 1]          [Mailbox 2]         [Mailbox 3]
//!    try_send()           try_send()          try_send()
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    SubscriberHandle     SubscriberHandle    SubscriberHandle
//!    recv() / drop        recv() / drop       recv() / drop
//! ```
//!
//! A registration lives from `register()` until its handle is released or
//! dropped. Messages published outside that window are not seen by it.

pub mod entry;
pub mod handle;
pub mod message;
pub mod store;

pub use entry::{Delivery, Mailbox, SubscriberId, MAILBOX_CAPACITY};
pub use handle::SubscriberHandle;
pub use message::Message;
pub use store::SubscriberRegistry;
