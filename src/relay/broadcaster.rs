//! Fan-out broadcaster
//!
//! Delivers each published message to every subscriber that is waiting at
//! that moment, and parks waiters until a message arrives or the poll
//! timeout expires.

use std::sync::Arc;
use std::time::Duration;

use crate::registry::{Delivery, Message, SubscriberHandle, SubscriberRegistry};
use crate::stats::{RelayCounters, RelayStats};

use super::config::RelayConfig;

/// Per-recipient outcome of a publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Mailboxes that accepted the message
    pub delivered: usize,
    /// Mailboxes that were full or already closed
    pub missed: usize,
}

impl PublishReport {
    /// Subscribers that were live when the message was published
    pub fn recipients(&self) -> usize {
        self.delivered + self.missed
    }
}

/// Single-room broadcaster
///
/// Publishing never waits on a subscriber. A subscriber whose mailbox still
/// holds an unread message, or which stopped waiting after the registry
/// snapshot was taken, misses that message.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    config: RelayConfig,
    counters: RelayCounters,
}

impl Broadcaster {
    /// Create a broadcaster with default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a broadcaster with custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        Self {
            registry: Arc::new(SubscriberRegistry::new()),
            config,
            counters: RelayCounters::new(),
        }
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Register a new subscriber for one poll cycle
    pub fn subscribe(&self) -> SubscriberHandle {
        self.registry.register()
    }

    /// Broadcast a message to every live subscriber
    pub fn publish(&self, message: impl Into<Message>) -> PublishReport {
        let message = message.into();
        let mut report = PublishReport::default();

        for mailbox in self.registry.snapshot() {
            match mailbox.offer(message.clone()) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Full | Delivery::Closed => {
                    report.missed += 1;
                    tracing::trace!(subscriber = %mailbox.id(), "Subscriber missed message");
                }
            }
        }

        self.counters.record_publish(report.delivered, report.missed);

        tracing::debug!(
            bytes = message.len(),
            delivered = report.delivered,
            missed = report.missed,
            "Message broadcast"
        );

        report
    }

    /// Broadcast the system notice announcing that `name` joined
    pub fn announce_join(&self, name: &str) -> PublishReport {
        tracing::info!(username = %name, "Participant joined");
        self.publish(Message::join_announcement(name))
    }

    /// Wait for the next message, up to `timeout`
    ///
    /// Consumes the registration: the subscriber is unregistered before this
    /// returns, whatever the outcome. If the returned future is dropped
    /// early, the handle is dropped with it and unregisters then.
    ///
    /// Returns `None` when the timeout expires, or immediately when the
    /// registration had already been removed and nothing was delivered.
    pub async fn wait(&self, mut handle: SubscriberHandle, timeout: Duration) -> Option<Message> {
        let id = handle.id();
        let outcome = tokio::time::timeout(timeout, handle.recv()).await;
        handle.release();

        let message = match outcome {
            Ok(Some(message)) => Some(message),
            // Registration removed elsewhere
            Ok(None) => None,
            // A publish may have landed between the deadline and the release
            Err(_) => handle.try_recv(),
        };

        self.counters.record_poll(message.is_some());

        match &message {
            Some(message) => {
                tracing::debug!(subscriber = %id, bytes = message.len(), "Poll answered");
            }
            None => {
                tracing::debug!(subscriber = %id, "Poll ended without message");
            }
        }

        message
    }

    /// Wait for the next message using the configured poll timeout
    pub async fn poll(&self, handle: SubscriberHandle) -> Option<Message> {
        self.wait(handle, self.config.poll_timeout).await
    }

    /// Current relay statistics
    pub fn stats(&self) -> RelayStats {
        self.counters.snapshot(self.registry.len())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test]
    async fn test_publish_before_wait_is_delivered() {
        let relay = Broadcaster::new();
        let a = relay.subscribe();

        let report = relay.publish("hello");
        assert_eq!(report.delivered, 1);

        let start = Instant::now();
        let msg = relay.wait(a, Duration::from_secs(5)).await;

        assert_eq!(msg, Some(Message::from("hello")));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(relay.registry().is_empty());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let relay = Broadcaster::new();
        let b = relay.subscribe();
        let timeout = Duration::from_millis(300);

        let start = Instant::now();
        let msg = relay.wait(b, timeout).await;
        let elapsed = start.elapsed();

        assert_eq!(msg, None);
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_secs(1));
        assert!(relay.registry().is_empty());
        assert_eq!(relay.stats().polls_timed_out, 1);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_a_copy() {
        let relay = Broadcaster::new();
        let c = relay.subscribe();
        let d = relay.subscribe();

        relay.publish("x");

        let timeout = Duration::from_secs(5);
        assert_eq!(relay.wait(c, timeout).await, Some(Message::from("x")));
        assert_eq!(relay.wait(d, timeout).await, Some(Message::from("x")));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let relay = Broadcaster::new();

        let report = relay.publish("nobody home");

        assert_eq!(report, PublishReport::default());
        assert_eq!(report.recipients(), 0);
        assert_eq!(relay.stats().messages_published, 1);
    }

    #[tokio::test]
    async fn test_full_mailbox_does_not_block_others() {
        let relay = Broadcaster::new();
        let busy = relay.subscribe();
        let others: Vec<_> = (0..4).map(|_| relay.subscribe()).collect();

        // Fill only the first mailbox
        relay.registry().snapshot()[0].offer(Message::from("unread"));

        let report = relay.publish("news");
        assert_eq!(report.delivered, 4);
        assert_eq!(report.missed, 1);

        let timeout = Duration::from_secs(1);
        assert_eq!(relay.wait(busy, timeout).await, Some(Message::from("unread")));
        for handle in others {
            assert_eq!(relay.wait(handle, timeout).await, Some(Message::from("news")));
        }
    }

    #[tokio::test]
    async fn test_wait_on_expired_registration_returns_immediately() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();
        relay.registry().unregister(handle.id());

        let start = Instant::now();
        let msg = relay.wait(handle, Duration::from_secs(10)).await;

        assert_eq!(msg, None);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unregistered_subscriber_misses_later_publish() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();
        relay.registry().unregister(handle.id());

        let report = relay.publish("too late");

        assert_eq!(report.recipients(), 0);
        assert_eq!(relay.wait(handle, Duration::from_millis(50)).await, None);
    }

    #[tokio::test]
    async fn test_pending_wait_is_woken_by_publish() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();

        let mut wait = task::spawn(relay.wait(handle, Duration::from_secs(5)));
        assert_pending!(wait.poll());

        relay.publish("ping");

        assert!(wait.is_woken());
        let msg = assert_ready!(wait.poll());
        assert_eq!(msg, Some(Message::from("ping")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_message_after_deadline_before_release_is_kept() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();
        let id = handle.id();

        let mut wait = task::spawn(relay.wait(handle, Duration::from_millis(100)));
        assert_pending!(wait.poll());

        tokio::time::advance(Duration::from_millis(150)).await;
        // Deadline is gone but the wait has not run since, so still registered
        assert!(relay.registry().contains(id));
        assert_eq!(relay.publish("late").delivered, 1);

        let msg = assert_ready!(wait.poll());
        assert_eq!(msg, Some(Message::from("late")));
        assert!(!relay.registry().contains(id));

        let stats = relay.stats();
        assert_eq!(stats.polls_answered, 1);
        assert_eq!(stats.polls_timed_out, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_without_message_unregisters_once() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();
        let id = handle.id();

        let mut wait = task::spawn(relay.wait(handle, Duration::from_millis(100)));
        assert_pending!(wait.poll());

        tokio::time::advance(Duration::from_millis(99)).await;
        assert_pending!(wait.poll());
        tokio::time::advance(Duration::from_millis(2)).await;

        assert_eq!(assert_ready!(wait.poll()), None);
        assert!(!relay.registry().contains(id));
        assert_eq!(relay.publish("after").recipients(), 0);
    }

    #[tokio::test]
    async fn test_dropped_wait_unregisters() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();
        let id = handle.id();

        let mut wait = task::spawn(relay.wait(handle, Duration::from_secs(30)));
        assert_pending!(wait.poll());
        assert!(relay.registry().contains(id));

        drop(wait);

        assert!(!relay.registry().contains(id));
        assert_eq!(relay.publish("after").recipients(), 0);
    }

    #[tokio::test]
    async fn test_aborted_task_unregisters() {
        let relay = Arc::new(Broadcaster::new());
        let handle = relay.subscribe();

        let task = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.wait(handle, Duration::from_secs(30)).await })
        };
        tokio::task::yield_now().await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(relay.registry().is_empty());
    }

    #[tokio::test]
    async fn test_one_registration_per_wait() {
        let relay = Arc::new(Broadcaster::new());

        let waiter = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move {
                let first = relay.poll(relay.subscribe()).await;
                let second = relay
                    .wait(relay.subscribe(), Duration::from_millis(100))
                    .await;
                (first, second)
            })
        };

        while relay.registry().is_empty() {
            tokio::task::yield_now().await;
        }
        relay.publish("only once");

        let (first, second) = waiter.await.unwrap();
        assert_eq!(first, Some(Message::from("only once")));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_announce_join() {
        let relay = Broadcaster::new();
        let handle = relay.subscribe();

        relay.announce_join("carol");

        let msg = relay.wait(handle, Duration::from_secs(1)).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(msg.payload()).unwrap();
        assert_eq!(value["content"], "Now entering room: carol");
    }

    #[tokio::test]
    async fn test_many_concurrent_waiters() {
        let relay = Arc::new(Broadcaster::new());
        let waiters: Vec<_> = (0..32)
            .map(|_| {
                let relay = Arc::clone(&relay);
                let handle = relay.subscribe();
                tokio::spawn(async move { relay.wait(handle, Duration::from_secs(5)).await })
            })
            .collect();

        let report = relay.publish("all");
        assert_eq!(report.delivered, 32);

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Some(Message::from("all")));
        }
        let stats = relay.stats();
        assert_eq!(stats.polls_answered, 32);
        assert_eq!(stats.live_subscribers, 0);
    }
}
