//! Long-poll fan-out
//!
//! The two operations the rest of the system relies on: publish a message
//! to everyone currently waiting, and wait (bounded) for the next message.
//!
//! ```text
//!   POST /api/messages               GET /api/messages (x N)
//!          │                                  │
//!          ▼                                  ▼
//!   Broadcaster::publish()          Broadcaster::subscribe()
//!          │                                  │
//!          │  snapshot + try_send             ▼
//!          └──────────────────────►  Broadcaster::wait(handle, 30s)
//!                                             │
//!                                  Some(msg) → 200, None → 204
//! ```
//!
//! Delivery is at most once per subscriber per message, and only to
//! subscribers that are parked in a wait when the message is published.

pub mod broadcaster;
pub mod config;

pub use broadcaster::{Broadcaster, PublishReport};
pub use config::{RelayConfig, DEFAULT_POLL_TIMEOUT};
