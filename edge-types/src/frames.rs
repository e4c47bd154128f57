//! Relay frame classification.
//!
//! The relay never validates payloads. It only peeks at them for two things:
//! routing metadata in JSON text frames, and the identity prefix (plus an
//! optional ping timestamp) of binary frames. Anything it cannot read is
//! forwarded untouched.

use serde::{Deserialize, Serialize, Serializer};

use crate::ClientId;

/// Length of the identity prefix carried by binary frames.
pub const IDENTITY_LEN: usize = 16;

/// Length of an identity frame followed by a big-endian `f64` timestamp.
pub const PING_LEN: usize = IDENTITY_LEN + 8;

/// A relay payload, exactly as received from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A text frame.
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Size of the payload in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Optional routing metadata found in JSON text frames.
///
/// Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    /// Application message type, used for logging only.
    pub kind: Option<String>,
    /// Self-declared sender id.
    pub sender: Option<String>,
    /// Intended recipient id; absent means broadcast.
    pub receiver: Option<String>,
}

/// A classified text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextFrame {
    /// A JSON object; routing fields may still all be absent.
    Routed(Routing),
    /// Not a JSON object. Forwarded verbatim with no routing.
    Opaque,
}

impl TextFrame {
    /// Classify a text frame. Never fails: unparseable input is `Opaque`.
    pub fn parse(text: &str) -> Self {
        let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(text) else {
            return TextFrame::Opaque;
        };

        let field = |name: &str| {
            fields
                .get(name)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        TextFrame::Routed(Routing {
            kind: field("type"),
            sender: field("sender"),
            receiver: field("receiver"),
        })
    }

    /// Routing metadata, if any.
    pub fn routing(&self) -> Option<&Routing> {
        match self {
            TextFrame::Routed(routing) => Some(routing),
            TextFrame::Opaque => None,
        }
    }
}

/// A classified binary frame.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryFrame {
    /// Fewer than 16 bytes; carries no identity.
    Short,
    /// Exactly 16 bytes: a client identity announcement.
    Identity {
        /// Identity derived from the 16 bytes.
        client_id: ClientId,
    },
    /// Identity prefix followed by a timestamp to be echoed back.
    Ping {
        /// Identity derived from the first 16 bytes.
        client_id: ClientId,
        /// Big-endian `f64` at bytes 16..24.
        timestamp: f64,
    },
    /// Identity prefix followed by fewer than 8 timestamp bytes.
    ///
    /// The identity still counts; the frame is neither answered nor relayed.
    Truncated {
        /// Identity derived from the first 16 bytes.
        client_id: ClientId,
    },
}

impl BinaryFrame {
    /// Classify a binary frame.
    pub fn parse(bytes: &[u8]) -> Self {
        let Some(client_id) = ClientId::from_identity_bytes(bytes) else {
            return BinaryFrame::Short;
        };

        if bytes.len() == IDENTITY_LEN {
            return BinaryFrame::Identity { client_id };
        }

        match bytes
            .get(IDENTITY_LEN..PING_LEN)
            .and_then(|raw| <[u8; 8]>::try_from(raw).ok())
        {
            Some(raw) => BinaryFrame::Ping {
                client_id,
                timestamp: f64::from_be_bytes(raw),
            },
            None => BinaryFrame::Truncated { client_id },
        }
    }

    /// The identity carried by this frame, if any.
    pub fn client_id(&self) -> Option<&ClientId> {
        match self {
            BinaryFrame::Short => None,
            BinaryFrame::Identity { client_id }
            | BinaryFrame::Ping { client_id, .. }
            | BinaryFrame::Truncated { client_id } => Some(client_id),
        }
    }
}

/// Reply to a binary ping, sent to the pinging socket only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    /// Always `"PONG"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The timestamp from the ping, echoed back.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: f64,
}

impl Pong {
    /// Create a pong echoing the given timestamp.
    pub fn new(timestamp: f64) -> Self {
        Self {
            kind: "PONG".to_string(),
            timestamp,
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        // Serializing a struct of a String and a number cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Whole-number timestamps are written as integers (`12345`, not `12345.0`),
/// matching what a JavaScript client would produce.
fn serialize_timestamp<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
