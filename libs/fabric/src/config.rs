//! Tunables for waits, timeouts and tag sequencing.

use std::time::Duration;

/// Configuration shared by every component of a [`Session`](crate::Session).
#[derive(Clone, Debug)]
pub struct Config {
    /// How often bounded waits re-check their condition
    pub poll_interval: Duration,

    /// Upper bound for `acquire_active_transport`
    pub transport_wait: Duration,

    /// Upper bound for waiting on the first outbound tag
    pub tag_wait: Duration,

    /// Default time a request waits for its correlated response
    pub request_timeout: Duration,

    /// Distance the stored tag jumps past every transmitted tag.
    ///
    /// Keeps locally allocated tags clear of the ones the remote side
    /// hands out on its own.
    pub tag_advance: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            transport_wait: Duration::from_secs(120),
            tag_wait: Duration::from_secs(120),
            request_timeout: Duration::from_secs(80),
            tag_advance: 50,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound both the transport and the tag waits
    pub fn with_wait_bound(mut self, bound: Duration) -> Self {
        self.transport_wait = bound;
        self.tag_wait = bound;
        self
    }

    pub fn with_transport_wait(mut self, bound: Duration) -> Self {
        self.transport_wait = bound;
        self
    }

    pub fn with_tag_wait(mut self, bound: Duration) -> Self {
        self.tag_wait = bound;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_tag_advance(mut self, offset: u64) -> Self {
        self.tag_advance = offset;
        self
    }
}
