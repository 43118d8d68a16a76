//! Reconnection policy with capped exponential backoff

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ChannelConfig;

/// Decides whether and when to re-attempt connection after an unexpected
/// close.
///
/// The wait before attempt `n` is `min(base * 2^n, cap)`. At most one
/// retry deadline is pending at any time; scheduling a new attempt
/// replaces the previous deadline.
#[derive(Debug)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempts: u32,
    deadline: Option<Instant>,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            attempts: 0,
            deadline: None,
        }
    }

    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_base_ms),
            Duration::from_millis(config.reconnect_cap_ms),
            config.max_reconnect_attempts,
        )
    }

    /// Number of attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a retry deadline is currently pending.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Backoff wait for the given attempt number.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Consume one attempt and arm the retry deadline.
    ///
    /// Returns the wait before the attempt, or `None` when the attempt
    /// budget is exhausted. Any previously pending deadline is replaced.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let wait = self.delay_for(self.attempts);
        self.deadline = Some(Instant::now() + wait);
        Some(wait)
    }

    /// Drop the pending retry deadline, keeping the attempt counter.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Zero the attempt counter and drop any pending deadline.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.deadline = None;
    }

    /// Resolves when the pending retry deadline elapses; pends forever
    /// while no retry is scheduled.
    pub async fn due(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
