//! Relay message type
//!
//! Messages are opaque byte payloads. The relay never looks inside them,
//! apart from building the one synthetic system message announcing a new
//! participant.

use bytes::Bytes;
use serde::Serialize;

/// Prefix of the system message sent when someone enters the room
pub const JOIN_ANNOUNCEMENT_PREFIX: &str = "Now entering room: ";

/// A message to be broadcast to subscribers
///
/// Cheap to clone: every subscriber shares the same reference-counted
/// allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Bytes,
}

#[derive(Serialize)]
struct SystemNotice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    content: &'a str,
}

impl Message {
    /// Create a message from any byte payload
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Build the `{"type": "system", ...}` notice announcing `name`
    pub fn join_announcement(name: &str) -> Self {
        let content = format!("{}{}", JOIN_ANNOUNCEMENT_PREFIX, name);
        let notice = SystemNotice {
            kind: "system",
            content: &content,
        };
        // Serializing a struct of two strings cannot fail.
        let json = serde_json::to_vec(&notice).unwrap_or_default();
        Self::new(json)
    }

    /// Borrow the raw payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the message and return its payload
    pub fn into_bytes(self) -> Bytes {
        self.payload
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Bytes> for Message {
    fn from(payload: Bytes) -> Self {
        Self::new(payload)
    }
}

impl From<&'static str> for Message {
    fn from(text: &'static str) -> Self {
        Self::new(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}
