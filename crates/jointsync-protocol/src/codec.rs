//! Codec for encoding and decoding jointsync events.
//!
//! Frames are JSON text. Inbound text is size-checked before parsing so a
//! hostile client cannot force an arbitrarily large allocation.

use thiserror::Error;

use crate::events::{ClientEvent, ServerEvent};

/// Default maximum inbound event size (1 MiB).
pub const MAX_EVENT_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Event exceeds the size limit.
    #[error("Event size {size} exceeds maximum {limit}")]
    EventTooLarge {
        /// Size of the rejected event.
        size: usize,
        /// The limit in effect.
        limit: usize,
    },

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON decoding error (bad shape or unknown event name).
    #[error("Decoding error: {0}")]
    Decode(#[source] serde_json::Error),

    /// Inbound frame is not valid UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
}

/// Encode a server event to a JSON text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &ServerEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}

/// Decode a client event from a JSON text frame, bounded by
/// [`MAX_EVENT_SIZE`].
///
/// # Errors
///
/// Returns an error if the text is too large, malformed JSON, or carries an
/// unknown event name.
pub fn decode(text: &str) -> Result<ClientEvent, ProtocolError> {
    decode_with_limit(text, MAX_EVENT_SIZE)
}

/// Decode a client event with a caller-supplied size limit.
///
/// # Errors
///
/// Returns an error if the text exceeds `max_bytes`, is malformed JSON, or
/// carries an unknown event name.
pub fn decode_with_limit(text: &str, max_bytes: usize) -> Result<ClientEvent, ProtocolError> {
    if text.len() > max_bytes {
        return Err(ProtocolError::EventTooLarge {
            size: text.len(),
            limit: max_bytes,
        });
    }
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Decode a client event from raw bytes.
///
/// Some clients send text frames as binary; tolerate that as long as the
/// bytes are UTF-8.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or do not decode as an event.
pub fn decode_bytes(data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
    decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{JointSnapshot, JointStateMessage, JointUpdate};

    #[test]
    fn test_decode_update_joint() {
        let raw = r#"{"event":"update_joint","data":{"jointName":"elbow","angle":1.57}}"#;
        let event = decode(raw).unwrap();

        match event {
            ClientEvent::UpdateJoint(update) => {
                assert_eq!(update.joint_name, "elbow");
                assert!((update.angle - 1.57).abs() < f64::EPSILON);
            }
            other => panic!("Expected UpdateJoint, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_joint_states() {
        let raw = r#"{
            "event": "joint_states",
            "data": {
                "header": {"stamp": {"secs": 0, "nsecs": 0}, "frame_id": ""},
                "name": ["shoulder", "elbow"],
                "position": [0.5, 1.57],
                "velocity": [],
                "effort": []
            }
        }"#;

        let event = decode(raw).unwrap();
        match event {
            ClientEvent::JointStates(msg) => {
                assert_eq!(msg.name.len(), 2);
                assert_eq!(msg.position, vec![0.5, 1.57]);
            }
            other => panic!("Expected JointStates, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_event() {
        let raw = r#"{"event":"teleport","data":{}}"#;
        assert!(matches!(decode(raw), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_non_numeric_angle() {
        let raw = r#"{"event":"update_joint","data":{"jointName":"elbow","angle":"fast"}}"#;
        assert!(matches!(decode(raw), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_too_large() {
        let padding = "x".repeat(MAX_EVENT_SIZE + 1);
        assert!(matches!(
            decode(&padding),
            Err(ProtocolError::EventTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_with_custom_limit() {
        let raw = r#"{"event":"update_joint","data":{"jointName":"elbow","angle":1.57}}"#;

        // Under the default limit but over a tighter caller-supplied one.
        assert!(decode(raw).is_ok());
        match decode_with_limit(raw, 16) {
            Err(ProtocolError::EventTooLarge { size, limit }) => {
                assert_eq!(size, raw.len());
                assert_eq!(limit, 16);
            }
            other => panic!("Expected EventTooLarge, got {:?}", other),
        }

        assert!(decode_with_limit(raw, raw.len()).is_ok());
    }

    #[test]
    fn test_decode_bytes_rejects_invalid_utf8() {
        assert!(matches!(
            decode_bytes(&[0xff, 0xfe, 0xfd]),
            Err(ProtocolError::NotUtf8)
        ));
    }

    #[test]
    fn test_encode_decode_echo_roundtrip() {
        let msg = JointStateMessage::from_pairs([("elbow".to_string(), 1.57)]);
        let encoded = encode(&ServerEvent::JointStates(msg.clone())).unwrap();

        // The server echoes client payloads verbatim; the same envelope must
        // parse back on the client side.
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["event"], "joint_states");
        assert_eq!(value["data"]["name"][0], "elbow");

        let update = ServerEvent::UpdateJoint(JointUpdate::new("wrist", -0.3));
        let encoded = encode(&update).unwrap();
        assert!(encoded.contains("\"jointName\":\"wrist\""));
    }

    #[test]
    fn test_encode_snapshot() {
        let snapshot: JointSnapshot = [("a".to_string(), 1.0), ("b".to_string(), 2.0)]
            .into_iter()
            .collect();
        let encoded = encode(&ServerEvent::ServerJointsUpdate(snapshot)).unwrap();
        assert_eq!(
            encoded,
            r#"{"event":"server_joints_update","data":{"a":1.0,"b":2.0}}"#
        );
    }
}
