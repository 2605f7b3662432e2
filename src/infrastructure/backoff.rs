use std::time::Duration;

use crate::types::{DEFAULT_MAX_RECONNECT_INTERVAL, DEFAULT_RECONNECT_INTERVAL};

/// Exponential backoff for reconnection scheduling.
///
/// Delays follow `min(base * 2^attempts, max)` with no jitter. Attempts are
/// unbounded; giving up is never decided here, only by the manual-close flag
/// on the client.
pub struct Backoff {
    attempts: u32,
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            attempts: 0,
            base_ms,
            max_ms,
        }
    }

    /// Delay to wait before the next attempt; increments the attempt count.
    pub fn next_delay(&mut self) -> Duration {
        // Cap the shift so the multiplication cannot overflow.
        let factor = 1u64 << self.attempts.min(20);
        let delay_ms = self.base_ms.saturating_mul(factor).min(self.max_ms);
        self.attempts += 1;
        Duration::from_millis(delay_ms)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the attempt count (on successful connect or manual reconnect)
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL, DEFAULT_MAX_RECONNECT_INTERVAL)
    }
}
