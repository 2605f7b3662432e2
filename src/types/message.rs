use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::constants::reserved_events;

/// A wire envelope: `{"type": <string>, ...arbitrary fields}`.
///
/// Payload fields are flattened into the envelope, so
/// `ChatMessage::with_data("foo", data)` with `data = {"bar": 1}` serializes
/// to `{"type":"foo","bar":1}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Map::new(),
        }
    }

    pub fn with_data(kind: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Heartbeat probe sent by the client
    pub fn ping() -> Self {
        Self::new(reserved_events::PING)
    }

    /// Whether this is a heartbeat acknowledgement from the server
    pub fn is_pong(&self) -> bool {
        self.kind == reserved_events::PONG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_fields_are_flattened() {
        let mut data = Map::new();
        data.insert("bar".to_string(), serde_json::json!(1));
        let message = ChatMessage::with_data("foo", data);

        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"type":"foo","bar":1}"#);
    }

    #[test]
    fn test_bare_envelope_serialization() {
        let message = ChatMessage::new("x");
        assert_eq!(serde_json::to_string(&message).unwrap(), r#"{"type":"x"}"#);
    }

    #[test]
    fn test_envelope_round_trip() {
        let mut data = Map::new();
        data.insert("team_id".to_string(), serde_json::json!("t-17"));
        data.insert("text".to_string(), serde_json::json!("found the egg"));
        let message = ChatMessage::with_data("chat_message", data);

        let serialized = serde_json::to_string(&message).unwrap();
        let deserialized: ChatMessage = serde_json::from_str(&serialized).unwrap();

        assert_eq!(message, deserialized);
    }

    #[test]
    fn test_pong_detection() {
        let pong: ChatMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert!(pong.is_pong());
        assert!(pong.data.is_empty());

        let other: ChatMessage = serde_json::from_str(r#"{"type":"notice","n":2}"#).unwrap();
        assert!(!other.is_pong());
    }
}
