//! Binary wire protocol for the relay.
//!
//! Events are bincode-encoded serde enums carried in WebSocket binary
//! frames. Each event names its type via the enum discriminant and carries
//! its payload inline:
//!
//! ```text
//! client → server: join-room(room_id) | code-update(room_id, code)
//! server → client: sync-code(code) | code-update(code) | user-count(n)
//! ```
//!
//! `sync-code` goes to the joining connection only; `code-update` goes to
//! every room member except the originator; `user-count` goes to the whole
//! room whenever membership changes.

use serde::{Deserialize, Serialize};

/// Events a client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientEvent {
    /// Join (or switch to) the named room.
    JoinRoom { room_id: String },
    /// Replace the room's shared buffer. Last write wins.
    CodeUpdate { room_id: String, code: String },
}

/// Events the relay sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServerEvent {
    /// Initial buffer snapshot, sent once to a joining connection.
    SyncCode { code: String },
    /// A peer's buffer update, fanned out to everyone but the sender.
    CodeUpdate { code: String },
    /// Current member count of the connection's room.
    UserCount { count: usize },
}

impl ClientEvent {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| WireError::Decode(e.to_string()))?;
        Ok(event)
    }
}

impl ServerEvent {
    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Deserialize from binary wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let (event, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| WireError::Decode(e.to_string()))?;
        Ok(event)
    }
}

/// Wire-level errors.
#[derive(Debug, Clone)]
pub enum WireError {
    Encode(String),
    Decode(String),
    ConnectionClosed,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "Encode error: {e}"),
            Self::Decode(e) => write!(f, "Decode error: {e}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_roundtrip() {
        let event = ClientEvent::JoinRoom {
            room_id: "r1".to_string(),
        };
        let encoded = event.encode().unwrap();
        let decoded = ClientEvent::decode(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_code_update_roundtrip() {
        let event = ClientEvent::CodeUpdate {
            room_id: "r1".to_string(),
            code: "fn main() {}".to_string(),
        };
        let encoded = event.encode().unwrap();
        let decoded = ClientEvent::decode(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_server_events_roundtrip() {
        let events = vec![
            ServerEvent::SyncCode {
                code: "x = 1".to_string(),
            },
            ServerEvent::CodeUpdate {
                code: "x = 2".to_string(),
            },
            ServerEvent::UserCount { count: 3 },
        ];
        for event in events {
            let encoded = event.encode().unwrap();
            let decoded = ServerEvent::decode(&encoded).unwrap();
            assert_eq!(decoded, event);
        }
    }

    #[test]
    fn test_unicode_buffer_roundtrip() {
        let event = ClientEvent::CodeUpdate {
            room_id: "комната".to_string(),
            code: "let π = 3.14; // 日本語".to_string(),
        };
        let encoded = event.encode().unwrap();
        let decoded = ClientEvent::decode(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        assert!(ClientEvent::decode(&garbage).is_err());
        assert!(ServerEvent::decode(&garbage).is_err());
    }

    #[test]
    fn test_small_event_size() {
        let event = ClientEvent::CodeUpdate {
            room_id: "r1".to_string(),
            code: "x".repeat(32),
        };
        let encoded = event.encode().unwrap();
        // Discriminant + two length-prefixed strings; no framing overhead
        // beyond that.
        assert!(
            encoded.len() < 64,
            "Encoded size {} too large for a 32-byte update",
            encoded.len()
        );
    }
}
