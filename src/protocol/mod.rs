//! Wire protocol data types
//!
//! Every frame exchanged over the transport is a JSON object with exactly
//! two top-level fields: `e` (event tag) and `d` (event-specific payload).

use serde::{Deserialize, Serialize};

/// Defined event tags.
pub mod event {
    /// Client announces its identity after connecting.
    pub const LOGIN: &str = "login";
    /// Client heartbeat.
    pub const PING: &str = "ping";
    /// Administrative request to revoke another session.
    pub const FORCE_OFFLINE: &str = "force_offline";
    /// Server-initiated forced logout notice.
    pub const FORCE_OFFLINE_CLIENT: &str = "force_offline_client";
}

/// One application frame exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event tag identifying the semantic type of the frame
    pub e: String,
    /// Event-specific payload
    pub d: serde_json::Value,
}

impl Frame {
    /// Login frame announcing the given identity.
    pub fn login(userid: &str) -> Self {
        Self {
            e: event::LOGIN.to_string(),
            d: serde_json::json!({ "userid": userid }),
        }
    }

    /// Heartbeat frame with an empty payload.
    pub fn ping() -> Self {
        Self {
            e: event::PING.to_string(),
            d: serde_json::json!({}),
        }
    }

    /// Administrative request to revoke the session of `userid`.
    pub fn force_offline(userid: &str) -> Self {
        Self {
            e: event::FORCE_OFFLINE.to_string(),
            d: serde_json::json!({ "userid": userid }),
        }
    }

    /// The `userid` field of the payload, if present.
    pub fn userid(&self) -> Option<&str> {
        self.d.get("userid").and_then(|value| value.as_str())
    }
}

/// Error types for session channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("transport open failed: {0}")]
    OpenFailed(String),
    #[error("connection closed unexpectedly: {0}")]
    UnexpectedClose(String),
    #[error("frame send failed: {0}")]
    SendFailed(String),
    #[error("malformed inbound frame: {0}")]
    Decode(String),
    #[error("reconnect attempts exhausted after {0} attempts")]
    ReconnectExhausted(u32),
    #[error("session revoked by server")]
    ForcedLogout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_frame_shape() {
        let frame = Frame::login("u1");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "e": "login", "d": { "userid": "u1" } })
        );
    }

    #[test]
    fn test_ping_frame_shape() {
        let frame = Frame::ping();
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, serde_json::json!({ "e": "ping", "d": {} }));
    }

    #[test]
    fn test_force_offline_frame_shape() {
        let frame = Frame::force_offline("u2");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "e": "force_offline", "d": { "userid": "u2" } })
        );
    }

    #[test]
    fn test_userid_extraction() {
        let frame: Frame =
            serde_json::from_str(r#"{"e":"force_offline_client","d":{"userid":"u1"}}"#).unwrap();
        assert_eq!(frame.e, event::FORCE_OFFLINE_CLIENT);
        assert_eq!(frame.userid(), Some("u1"));

        let frame: Frame = serde_json::from_str(r#"{"e":"announce","d":{"text":"hi"}}"#).unwrap();
        assert_eq!(frame.userid(), None);
    }

    #[test]
    fn test_frame_requires_both_fields() {
        assert!(serde_json::from_str::<Frame>(r#"{"e":"ping"}"#).is_err());
        assert!(serde_json::from_str::<Frame>(r#"{"d":{}}"#).is_err());
        assert!(serde_json::from_str::<Frame>("[1,2]").is_err());
    }
}
