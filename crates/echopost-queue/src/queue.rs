//! Write side of the queue: enqueue, delete, flush, emptiness.

use crate::error::from_tokio_rusqlite;
use crate::{QueueResult, QueueSnapshot};
use echopost_core::{LogRecord, Payload, DEFAULT_SNAPSHOT_PAGE_SIZE};
use parking_lot::Mutex;
use rusqlite::params;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};
use ulid::{Generator, Ulid};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entries (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL
    ) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS queue_meta (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        flushed_at INTEGER NOT NULL
    );
    INSERT OR IGNORE INTO queue_meta (id, flushed_at) VALUES (1, 0);
";

/// Unique, time-ordered key of a queue entry.
///
/// Keys are ULIDs from a monotonic generator: two keys minted in the same
/// millisecond still differ and still sort in mint order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey(String);

impl QueueKey {
    pub(crate) fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, crash-safe store of records awaiting delivery.
///
/// Cloning is cheap; all clones share one write connection, so writes from
/// concurrent tasks are serialized on its executor thread.
#[derive(Clone)]
pub struct DurableQueue {
    conn: Connection,
    path: PathBuf,
    keys: Arc<Mutex<Generator>>,
    page_size: usize,
}

impl DurableQueue {
    /// Open (or create) the queue database at `path`.
    ///
    /// Writes default to `synchronous = NORMAL`: a commit reaches the WAL but
    /// is only fsynced by [`DurableQueue::flush`].
    pub async fn open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(from_tokio_rusqlite)?;

        conn.call(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        info!(path = %path.display(), "queue_opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            keys: Arc::new(Mutex::new(Generator::new())),
            page_size: DEFAULT_SNAPSHOT_PAGE_SIZE,
        })
    }

    /// Set how many entries a snapshot fetches per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Get the database file path.
    pub fn db_path(&self) -> &Path {
        &self.path
    }

    /// Narrowed handle that can only enqueue.
    pub fn writer(&self) -> QueueWriter {
        QueueWriter {
            queue: self.clone(),
        }
    }

    /// Persist a record under a fresh key.
    ///
    /// A record that cannot be serialized is stored with an empty payload
    /// instead of failing the caller. Storage errors are returned.
    pub async fn enqueue(&self, record: &LogRecord) -> QueueResult<QueueKey> {
        let value = encode_record(record);
        let key = self.next_key();
        let key_text = key.as_str().to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO entries (key, value) VALUES (?1, ?2)",
                    params![key_text, value],
                )?;
                Ok(())
            })
            .await
            .map_err(from_tokio_rusqlite)?;

        debug!(key = %key, "queue_enqueued");
        Ok(key)
    }

    /// Open a snapshot over every entry currently stored, in key order.
    pub async fn iterate(&self) -> QueueResult<QueueSnapshot> {
        QueueSnapshot::open(&self.path, self.page_size).await
    }

    /// Delete `keys` in one transaction. Either every key is removed or none is.
    ///
    /// Returns the number of rows removed; keys already absent are ignored.
    pub async fn delete_batch(&self, keys: &[QueueKey]) -> QueueResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();

        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut removed = 0;
                {
                    let mut stmt = tx.prepare_cached("DELETE FROM entries WHERE key = ?1")?;
                    for key in &keys {
                        removed += stmt.execute([key])?;
                    }
                }
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(from_tokio_rusqlite)?;

        debug!(removed, "queue_batch_deleted");
        Ok(removed)
    }

    /// Force everything written so far onto stable storage.
    ///
    /// A write under `synchronous = FULL` fsyncs the WAL, carrying every
    /// earlier relaxed commit with it. A passive checkpoint then folds what it
    /// can into the main file without waiting on open snapshots.
    pub async fn flush(&self) -> QueueResult<()> {
        let stamp = chrono::Utc::now().timestamp_millis();

        self.conn
            .call(move |conn| {
                conn.execute_batch("PRAGMA synchronous = FULL;")?;
                let synced = conn.execute(
                    "UPDATE queue_meta SET flushed_at = ?1 WHERE id = 1",
                    [stamp],
                );
                conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
                synced?;

                conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// True if no entries remain.
    pub async fn is_empty(&self) -> QueueResult<bool> {
        self.conn
            .call(|conn| {
                let empty: bool =
                    conn.query_row("SELECT NOT EXISTS (SELECT 1 FROM entries)", [], |row| {
                        row.get(0)
                    })?;
                Ok(empty)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Number of stored entries.
    pub async fn len(&self) -> QueueResult<u64> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(from_tokio_rusqlite)
    }

    /// Close the write connection after pending operations finish.
    pub async fn close(self) -> QueueResult<()> {
        self.conn.close().await.map_err(from_tokio_rusqlite)?;
        info!(path = %self.path.display(), "queue_closed");
        Ok(())
    }

    fn next_key(&self) -> QueueKey {
        let ulid = self.keys.lock().generate().unwrap_or_else(|_| {
            // The random component overflowed within one millisecond.
            Ulid::new()
        });
        QueueKey::new(ulid.to_string())
    }
}

/// Enqueue-only capability handed to the ingestion server.
#[derive(Clone)]
pub struct QueueWriter {
    queue: DurableQueue,
}

impl QueueWriter {
    pub async fn enqueue(&self, record: &LogRecord) -> QueueResult<QueueKey> {
        self.queue.enqueue(record).await
    }
}

fn encode_record(record: &LogRecord) -> String {
    match serde_json::to_string(record) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "queue_encode_error");
            let fallback = LogRecord {
                payload: Payload::new(),
                pipelines: record.pipelines.clone(),
                received_at: record.received_at,
            };
            serde_json::to_string(&fallback).unwrap_or_else(|_| String::from("{}"))
        }
    }
}
