//! Durable queue of log records awaiting delivery.
//!
//! Records live in a single SQLite table keyed by ULID strings, so key order
//! follows arrival order. The write connection runs on a dedicated thread via
//! `tokio-rusqlite`; each replay snapshot gets its own read-only connection
//! holding one read transaction, which SQLite's WAL mode keeps consistent
//! while ingestion keeps writing.

mod error;
mod queue;
mod snapshot;

pub use error::{QueueError, QueueResult};
pub use queue::{DurableQueue, QueueKey, QueueWriter};
pub use snapshot::{QueueEntry, QueueSnapshot};
