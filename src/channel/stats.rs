//! Channel statistics collection
//!
//! Cheap in-process counters for frames and reconnects, shared between
//! the channel actor and observers. Counters are also exported through
//! the `metrics` facade for external collectors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use metrics::counter;

/// Live counters owned by the channel, updated from the actor task.
#[derive(Debug, Default)]
pub struct ChannelStats {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    pings_sent: AtomicU64,
    reconnect_attempts: AtomicU64,
    decode_failures: AtomicU64,
    last_message_time: AtomicU64,
}

/// Point-in-time copy of the channel counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub pings_sent: u64,
    pub reconnect_attempts: u64,
    pub decode_failures: u64,
    /// Unix millis of the last delivered inbound frame, 0 if none yet.
    pub last_message_time: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl ChannelStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        counter!("sessionlink_frames_sent_total", 1);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_time.store(now_millis(), Ordering::Relaxed);
        counter!("sessionlink_frames_received_total", 1);
    }

    pub fn record_ping(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
        counter!("sessionlink_pings_sent_total", 1);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        counter!("sessionlink_reconnect_attempts_total", 1);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        counter!("sessionlink_decode_failures_total", 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            last_message_time: self.last_message_time.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ChannelStats::new();
        stats.record_sent();
        stats.record_sent();
        stats.record_ping();
        stats.record_decode_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.pings_sent, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.frames_received, 0);
        assert_eq!(snapshot.last_message_time, 0);
    }

    #[test]
    fn test_received_updates_last_message_time() {
        let stats = ChannelStats::new();
        stats.record_received();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_received, 1);
        assert!(snapshot.last_message_time > 0);
    }
}
