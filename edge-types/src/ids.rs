//! Identity and cache-key types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// A named broadcast domain for relay participants.
///
/// Taken verbatim from the `/group/:id` path segment. Groups are
/// ephemeral and carry no other state.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(String);

impl GroupId {
    /// Create a GroupId, rejecting empty identifiers.
    pub fn new(id: impl Into<String>) -> Result<Self, TypesError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypesError::EmptyGroupId);
        }
        Ok(Self(id))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

/// The self-declared identity of a relay participant.
///
/// Either an explicit `sender` from a JSON frame, the `client` query hint,
/// or the first 16 bytes of a binary frame rendered as a UUID.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Create a ClientId from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a ClientId from the leading 16 bytes of a binary frame.
    ///
    /// Returns `None` if fewer than 16 bytes are available. The result is
    /// the lowercase hyphenated (`8-4-4-4-12`) UUID form of those bytes.
    pub fn from_identity_bytes(bytes: &[u8]) -> Option<Self> {
        let prefix: [u8; 16] = bytes.get(..16)?.try_into().ok()?;
        Some(Self(uuid::Uuid::from_bytes(prefix).hyphenated().to_string()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl PartialEq<str> for ClientId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Content address of a (source text, target locale) pair.
///
/// BLAKE3 over the UTF-8 bytes of the text immediately followed by the
/// locale. Used as both the translation cache key and the lock key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash a source text together with its target locale.
    pub fn of(text: &str, locale: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        hasher.update(locale.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Parse a hash from its 64-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(s).map_err(|_| TypesError::InvalidHash(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TypesError::InvalidHash(s.to_string()))?;
        Ok(Self(arr))
    }

    /// Lowercase hex encoding, the form used as a storage key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..12])
    }
}
