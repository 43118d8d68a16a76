//! Inbound message router
//!
//! Decodes each inbound text frame and classifies it by event tag. Parse
//! failures never abort the connection; the frame is dropped upstream.

use tracing::{debug, warn};

use crate::protocol::{ChannelError, Frame, event};

/// Routing decision for one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Append to the message sequence, nothing else.
    Deliver,
    /// The server revoked this session.
    ForcedLogout { userid: String },
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<Frame, ChannelError> {
    serde_json::from_str::<Frame>(text).map_err(|e| ChannelError::Decode(e.to_string()))
}

/// Classify a parsed frame against the session's own identity.
///
/// Only a `force_offline_client` notice whose payload identity matches
/// our own triggers the forced-logout protocol; every other frame,
/// recognized or not, is plain delivery.
pub fn dispatch(frame: &Frame, identity: &str) -> Dispatch {
    if frame.e == event::FORCE_OFFLINE_CLIENT {
        match frame.userid() {
            Some(userid) if userid == identity => {
                return Dispatch::ForcedLogout {
                    userid: userid.to_string(),
                };
            }
            Some(other) => {
                debug!("force offline notice for {} does not match this session", other);
            }
            None => {
                warn!("force offline notice without a userid payload, ignoring");
            }
        }
    }
    Dispatch::Deliver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        let frame = decode(r#"{"e":"ping","d":{}}"#).unwrap();
        assert_eq!(frame, Frame::ping());
    }

    #[test]
    fn test_decode_malformed_frame() {
        let result = decode("not json at all");
        assert!(matches!(result, Err(ChannelError::Decode(_))));

        let result = decode(r#"{"event":"ping"}"#);
        assert!(matches!(result, Err(ChannelError::Decode(_))));
    }

    #[test]
    fn test_dispatch_matching_forced_logout() {
        let frame = decode(r#"{"e":"force_offline_client","d":{"userid":"u1"}}"#).unwrap();
        assert_eq!(
            dispatch(&frame, "u1"),
            Dispatch::ForcedLogout {
                userid: "u1".to_string()
            }
        );
    }

    #[test]
    fn test_dispatch_mismatched_identity_is_plain_delivery() {
        let frame = decode(r#"{"e":"force_offline_client","d":{"userid":"u2"}}"#).unwrap();
        assert_eq!(dispatch(&frame, "u1"), Dispatch::Deliver);
    }

    #[test]
    fn test_dispatch_missing_userid_is_plain_delivery() {
        let frame = decode(r#"{"e":"force_offline_client","d":{}}"#).unwrap();
        assert_eq!(dispatch(&frame, "u1"), Dispatch::Deliver);
    }

    #[test]
    fn test_dispatch_unrecognized_tag_is_plain_delivery() {
        let frame = decode(r#"{"e":"announce","d":{"text":"maintenance at noon"}}"#).unwrap();
        assert_eq!(dispatch(&frame, "u1"), Dispatch::Deliver);
    }
}
