//! Error types for edge-types.

use thiserror::Error;

/// Errors raised while constructing or parsing edge types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Group identifiers must be non-empty.
    #[error("group id must not be empty")]
    EmptyGroupId,

    /// A content hash was not 64 hex characters.
    #[error("invalid content hash: {0}")]
    InvalidHash(String),

    /// Unsupported text kind.
    #[error("unknown text kind: {0}")]
    UnknownTextKind(String),

    /// Unsupported description kind.
    #[error("unknown description kind: {0}")]
    UnknownDescriptionKind(String),
}
