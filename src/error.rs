//! Error types for the storage layer.
//!
//! Only the physical `get`/`set` primitives surface these to callers.
//! Touch and sweep absorb them into a boolean or a count plus a log line.

use thiserror::Error;

/// Errors raised by backing stores and the namespaced store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The SQLite driver reported a failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record envelope could not be encoded or decoded as JSON.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A `:base64:` payload inside a record was malformed.
    #[error("invalid binary payload: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The backing store could not be opened at startup.
    #[error("backing store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The shared connection has already been released.
    #[error("backing store connection is closed")]
    Closed,

    /// The connection string names an unsupported backend.
    #[error("invalid storage uri: {0}")]
    InvalidUri(String),

    /// Preparing the database location on disk failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking database task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Creates an `Unavailable` error from anything printable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Result alias used across the storage layer.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
