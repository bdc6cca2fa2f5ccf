//! Single-room chat relay over HTTP long polling
//!
//! Clients post text messages and every other connected client receives
//! them by long polling. The heart of the crate is a fan-out broadcaster:
//!
//! - [`registry`]: the set of subscribers currently parked in a long poll,
//!   each with a single-slot mailbox
//! - [`relay`]: `publish` to everyone waiting, and a bounded `wait` that
//!   always unregisters its subscriber on the way out
//! - [`server`]: the HTTP front end and static file serving
//!
//! ```no_run
//! use std::time::Duration;
//! use pctochat::relay::Broadcaster;
//!
//! # async fn example() {
//! let relay = Broadcaster::new();
//! let handle = relay.subscribe();
//!
//! relay.publish("hello");
//!
//! let message = relay.wait(handle, Duration::from_secs(30)).await;
//! assert_eq!(message.unwrap().payload().as_ref(), b"hello");
//! # }
//! ```
//!
//! Delivery is best-effort: a subscriber sees only messages published while
//! it is waiting, and at most one message per wait.

pub mod error;
pub mod net;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{Message, SubscriberHandle, SubscriberRegistry};
pub use relay::{Broadcaster, PublishReport, RelayConfig};
pub use server::{RelayServer, ServerConfig};
