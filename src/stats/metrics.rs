//! Statistics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Running counters updated by the broadcaster
#[derive(Debug)]
pub struct RelayCounters {
    started_at: Instant,
    messages_published: AtomicU64,
    deliveries: AtomicU64,
    missed_deliveries: AtomicU64,
    polls_answered: AtomicU64,
    polls_timed_out: AtomicU64,
}

impl RelayCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            messages_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            missed_deliveries: AtomicU64::new(0),
            polls_answered: AtomicU64::new(0),
            polls_timed_out: AtomicU64::new(0),
        }
    }

    /// Record one publish and its per-recipient outcome
    pub fn record_publish(&self, delivered: usize, missed: usize) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.missed_deliveries
            .fetch_add(missed as u64, Ordering::Relaxed);
    }

    /// Record the end of a wait
    pub fn record_poll(&self, answered: bool) {
        if answered {
            self.polls_answered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.polls_timed_out.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, live_subscribers: usize) -> RelayStats {
        RelayStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            missed_deliveries: self.missed_deliveries.load(Ordering::Relaxed),
            polls_answered: self.polls_answered.load(Ordering::Relaxed),
            polls_timed_out: self.polls_timed_out.load(Ordering::Relaxed),
            live_subscribers,
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for RelayCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay-wide statistics
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Messages passed to `publish`
    pub messages_published: u64,
    /// Copies placed into a mailbox
    pub deliveries: u64,
    /// Copies dropped because the mailbox was full or closed
    pub missed_deliveries: u64,
    /// Waits that returned a message
    pub polls_answered: u64,
    /// Waits that returned nothing
    pub polls_timed_out: u64,
    /// Subscribers currently waiting
    pub live_subscribers: usize,
    /// Time since the relay was created
    pub uptime: Duration,
}

impl RelayStats {
    /// Average number of copies delivered per published message
    pub fn fan_out(&self) -> f64 {
        if self.messages_published > 0 {
            self.deliveries as f64 / self.messages_published as f64
        } else {
            0.0
        }
    }
}
