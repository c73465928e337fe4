//! Lifecycle error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from lifecycle management.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Another controller holds the accepting flag for this base directory.
    #[error("Accepting flag already held: {0}")]
    FlagAlreadyHeld(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Setup error: {0}")]
    Core(#[from] echopost_core::CoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] echopost_queue::QueueError),
}

/// Result type alias using LifecycleError.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
