//! Queue error types.

use thiserror::Error;

/// Queue error type.
#[derive(Error, Debug)]
pub enum QueueError {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Executor thread or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A stored value that no longer decodes as a record
    #[error("Entry {key} is not a valid record: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using QueueError.
pub type QueueResult<T> = Result<T, QueueError>;

/// Convert a tokio_rusqlite::Error to QueueError.
pub(crate) fn from_tokio_rusqlite(e: tokio_rusqlite::Error) -> QueueError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => QueueError::Sqlite(e),
        tokio_rusqlite::Error::Close(_) => QueueError::Connection("Connection closed".to_string()),
        other => QueueError::Connection(other.to_string()),
    }
}
