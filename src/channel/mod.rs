//! Session channel management module
//!
//! Owns the transport lifecycle, the heartbeat driver, the reconnection
//! policy and the inbound message router for one session channel.

pub mod backoff;
pub mod heartbeat;
pub mod manager;
pub mod router;
pub mod stats;

// Re-export commonly used types
pub use manager::{ChannelNotice, ConnectionStatus, ReceivedFrame, SessionChannel};
pub use stats::{ChannelStats, StatsSnapshot};
