//! Tag Sequencer: tracks the last tag this side put on the wire.
//!
//! The stored tag is written only from the outbound path. Inbound frames
//! carry the remote side's own tags and never touch it.

use std::time::Duration;

use parking_lot::Mutex;
use tagline_core::{Frame, Tag};

use crate::config::Config;
use crate::error::{Result, TimeoutKind};
use crate::wait::wait_for;

pub struct TagSequencer {
    current: Mutex<Option<Tag>>,
    advance: u64,
    poll_interval: Duration,
    wait_bound: Duration,
}

impl TagSequencer {
    pub fn new(config: &Config) -> Self {
        Self {
            current: Mutex::new(None),
            advance: config.tag_advance,
            poll_interval: config.poll_interval,
            wait_bound: config.tag_wait,
        }
    }

    /// Stored tag, if one has been observed yet
    pub fn peek(&self) -> Option<Tag> {
        self.current.lock().clone()
    }

    /// Wait until the first outbound tag is known, then return the stored tag
    pub async fn current_tag(&self) -> Result<Tag> {
        wait_for(|| self.peek(), self.poll_interval, self.wait_bound, TimeoutKind::Tag).await
    }

    /// Tag for the next request. Does not modify the stored tag.
    ///
    /// Callers use the result for exactly one request; the stored tag moves
    /// once that request is transmitted.
    pub async fn next_tag(&self) -> Result<Tag> {
        Ok(self.current_tag().await?.next())
    }

    /// Record an outbound frame about to hit the wire.
    ///
    /// A tagged frame moves the stored tag to its tag plus the configured
    /// advance. Returns the newly stored tag.
    pub fn observe_outbound(&self, frame: &Frame) -> Option<Tag> {
        let sent = frame.tag()?;
        let stored = sent.advanced(self.advance);
        tracing::debug!(%sent, %stored, "outbound tag observed");
        *self.current.lock() = Some(stored.clone());
        Some(stored)
    }

    /// Forget the stored tag
    pub fn reset(&self) {
        *self.current.lock() = None;
    }
}
