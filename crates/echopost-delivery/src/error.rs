//! Delivery error types.

use echopost_queue::QueueError;
use thiserror::Error;

/// Delivery error type.
///
/// Every variant a replay pass can return is transient: the records involved
/// stay queued and are retried on a later pass.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Connection refused, timeout, DNS, or a broken response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote answered with a status above 500
    #[error("Server error: status {status}")]
    ServerError { status: u16 },

    /// Queue read, delete, or flush failure
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// HTTP client could not be built
    #[error("Client setup error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}

/// Result type alias using DeliveryError.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
