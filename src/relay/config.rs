//! Relay configuration

use std::time::Duration;

/// How long a long poll waits before answering with "no message"
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Broadcaster configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bound on a single wait
    pub poll_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Set the long-poll timeout
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}
