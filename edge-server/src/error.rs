//! Error types for xmcl-edge.

/// Failure of a translation job.
///
/// Configuration errors have their own [`ConfigError`](crate::config::ConfigError)
/// and are only seen at startup.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Translation backend error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A stored row could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Translation backend errors.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Request could not be sent or the body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status and no structured error.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Backend answered with `{"error": {...}}`.
    #[error("backend error {code}: {message} ({kind})")]
    Api {
        /// Backend error code.
        code: String,
        /// Human readable message.
        message: String,
        /// Backend error type.
        kind: String,
    },

    /// A success reply that is not a chat completion.
    #[error("malformed backend reply: {0}")]
    Decode(#[from] serde_json::Error),

    /// A reply without any choices.
    #[error("backend reply had no choices")]
    EmptyReply,

    /// The API key environment variable is not set.
    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Result type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
