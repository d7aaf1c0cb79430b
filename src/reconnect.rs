// src/reconnect.rs
//! Reconnection policy for the parsing loop

use crate::settings::RECONNECTION_DELAY;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether the worker may make another connection attempt after a
/// failure. Tracks *consecutive* failures: the counter resets only on a
/// successful device acquisition, never on a merely successful read.
pub struct ReconnectionSupervisor {
    allow: Arc<AtomicBool>,
    maximum_attempts: i32,
    delay: Duration,
    failures: u32,
}

impl ReconnectionSupervisor {
    /// `allow` is shared with the interpreter so automatic reconnection can
    /// be toggled while the worker is running. `maximum_attempts` of `-1`
    /// means unlimited.
    pub fn new(allow: Arc<AtomicBool>, maximum_attempts: i32) -> Self {
        Self {
            allow,
            maximum_attempts,
            delay: RECONNECTION_DELAY,
            failures: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Consult the policy after a failure. When a retry is permitted this
    /// waits out the backoff delay, counts the attempt, and returns true.
    pub async fn query_reconnect_allowed(&mut self) -> bool {
        if !self.allow.load(Ordering::Relaxed) {
            debug!("automatic reconnection disabled; not retrying");
            return false;
        }
        if self.maximum_attempts >= 0 && self.failures >= self.maximum_attempts as u32 {
            warn!(
                failures = self.failures,
                "reconnection attempts exhausted; giving up"
            );
            return false;
        }
        tokio::time::sleep(self.delay).await;
        self.failures += 1;
        debug!(attempt = self.failures, "retrying connection");
        true
    }

    /// Called on successful device acquisition.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}
