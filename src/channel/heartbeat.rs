//! Heartbeat driver
//!
//! Proves liveness to the server at a fixed cadence while connected. The
//! driver owns at most one ticker; start and stop are both idempotent.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    ticker: Option<Interval>,
}

impl Heartbeat {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
        }
    }

    /// Arm the ticker. The first tick fires one full interval from now.
    ///
    /// Starting while already running replaces the previous ticker, so no
    /// duplicate tick sources can exist.
    pub fn start(&mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
    }

    /// Disarm the ticker. Safe no-op when not running.
    pub fn stop(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves on the next tick; pends forever while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tick_fires_after_one_interval() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        heartbeat.start();

        let first = tokio::time::timeout(Duration::from_secs(31), heartbeat.tick()).await;
        assert!(first.is_ok());
        let second = tokio::time::timeout(Duration::from_secs(31), heartbeat.tick()).await;
        assert!(second.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_pends_while_stopped() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        assert!(!heartbeat.is_running());

        let idle = tokio::time::timeout(Duration::from_secs(120), heartbeat.tick()).await;
        assert!(idle.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        heartbeat.stop();
        heartbeat.start();
        heartbeat.stop();
        heartbeat.stop();
        assert!(!heartbeat.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rearms_the_full_interval() {
        let mut heartbeat = Heartbeat::new(Duration::from_secs(30));
        heartbeat.start();

        // Let most of an interval elapse, then restart.
        tokio::time::sleep(Duration::from_secs(29)).await;
        heartbeat.start();

        // The old ticker would fire within a second; the fresh one must not.
        let early = tokio::time::timeout(Duration::from_secs(2), heartbeat.tick()).await;
        assert!(early.is_err());
        let on_time = tokio::time::timeout(Duration::from_secs(31), heartbeat.tick()).await;
        assert!(on_time.is_ok());
    }
}
