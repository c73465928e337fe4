//! Read side of the queue: lazy, snapshot-consistent scans.

use crate::error::from_tokio_rusqlite;
use crate::{QueueError, QueueKey, QueueResult};
use echopost_core::LogRecord;
use rusqlite::{params, OpenFlags};
use std::collections::VecDeque;
use std::path::Path;
use tokio_rusqlite::Connection;
use tracing::debug;

/// One stored entry as read from the queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub key: QueueKey,
    /// Stored text, exactly as written.
    pub raw: String,
}

impl QueueEntry {
    /// Decode the stored text back into a record.
    pub fn decode(&self) -> QueueResult<LogRecord> {
        serde_json::from_str(&self.raw).map_err(|source| QueueError::Decode {
            key: self.key.to_string(),
            source,
        })
    }
}

/// Forward-only view of the entries present when the snapshot was opened.
///
/// The snapshot owns a read-only connection inside an open read transaction,
/// so writes and deletes made after it was opened are invisible to it. Pages
/// are fetched on demand. Once the last page is read, or the snapshot is
/// dropped, the transaction ends and the connection closes.
pub struct QueueSnapshot {
    conn: Option<Connection>,
    page_size: usize,
    buffer: VecDeque<QueueEntry>,
    last_key: String,
    exhausted: bool,
}

impl QueueSnapshot {
    pub(crate) async fn open(path: &Path, page_size: usize) -> QueueResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .await
        .map_err(from_tokio_rusqlite)?;

        conn.call(|conn| {
            conn.execute_batch("PRAGMA busy_timeout = 5000; BEGIN;")?;
            Ok(())
        })
        .await
        .map_err(from_tokio_rusqlite)?;

        let mut snapshot = Self {
            conn: Some(conn),
            page_size,
            buffer: VecDeque::new(),
            last_key: String::new(),
            exhausted: false,
        };
        // The first read pins the transaction's view of the database.
        snapshot.fill().await?;
        Ok(snapshot)
    }

    /// Next entry in key order, or `None` once the snapshot is exhausted.
    pub async fn next(&mut self) -> QueueResult<Option<QueueEntry>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    /// End the read transaction and close the connection now.
    pub async fn close(mut self) {
        self.release().await;
    }

    async fn fill(&mut self) -> QueueResult<()> {
        let Some(conn) = &self.conn else {
            self.exhausted = true;
            return Ok(());
        };

        let after = self.last_key.clone();
        let limit = self.page_size as i64;
        let rows: Vec<(String, String)> = conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT key, value FROM entries WHERE key > ?1 ORDER BY key LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![after, limit], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(from_tokio_rusqlite)?;

        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some((key, _)) = rows.last() {
            self.last_key = key.clone();
        }
        self.buffer.extend(rows.into_iter().map(|(key, raw)| QueueEntry {
            key: QueueKey::new(key),
            raw,
        }));

        if self.exhausted {
            self.release().await;
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            let _ = conn
                .call(|conn| {
                    conn.execute_batch("ROLLBACK;")?;
                    Ok(())
                })
                .await;
            if let Err(e) = conn.close().await {
                debug!(error = ?e, "snapshot_close_error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::DurableQueue;
    use echopost_core::LogRecord;
    use tempfile::tempdir;

    fn record(n: usize) -> LogRecord {
        LogRecord::from_producer(&format!(r#"{{"n":{n}}}"#), vec![])
    }

    #[tokio::test]
    async fn test_snapshot_ignores_later_writes_across_pages() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite"))
            .await
            .unwrap()
            .with_page_size(2);

        for n in 0..5 {
            queue.enqueue(&record(n)).await.unwrap();
        }

        let mut snapshot = queue.iterate().await.unwrap();
        let first = snapshot.next().await.unwrap().unwrap();

        // Written after the snapshot opened: must not show up.
        queue.enqueue(&record(99)).await.unwrap();
        // Deleted after the snapshot opened: must still show up.
        let all_keys = {
            let mut s = queue.iterate().await.unwrap();
            let mut keys = Vec::new();
            while let Some(e) = s.next().await.unwrap() {
                keys.push(e.key);
            }
            keys
        };
        queue.delete_batch(&all_keys[3..4]).await.unwrap();

        let mut seen = vec![first.decode().unwrap().payload["n"].as_u64().unwrap()];
        while let Some(entry) = snapshot.next().await.unwrap() {
            seen.push(entry.decode().unwrap().payload["n"].as_u64().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fresh_iterate_sees_current_state() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite"))
            .await
            .unwrap();

        let mut empty = queue.iterate().await.unwrap();
        assert!(empty.next().await.unwrap().is_none());
        // Exhausted snapshots stay exhausted.
        assert!(empty.next().await.unwrap().is_none());

        queue.enqueue(&record(1)).await.unwrap();
        let mut snapshot = queue.iterate().await.unwrap();
        assert!(snapshot.next().await.unwrap().is_some());
        assert!(snapshot.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_snapshot_releases_reader() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite"))
            .await
            .unwrap()
            .with_page_size(1);
        for n in 0..3 {
            queue.enqueue(&record(n)).await.unwrap();
        }

        let mut snapshot = queue.iterate().await.unwrap();
        snapshot.next().await.unwrap();
        snapshot.close().await;

        queue.flush().await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_undecodable_entry_reports_key() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite"))
            .await
            .unwrap();
        let raw = rusqlite::Connection::open(queue.db_path()).unwrap();
        raw.execute(
            "INSERT INTO entries (key, value) VALUES ('0000', 'not a record')",
            [],
        )
        .unwrap();

        let mut snapshot = queue.iterate().await.unwrap();
        let entry = snapshot.next().await.unwrap().unwrap();
        assert_eq!(entry.raw, "not a record");
        let err = entry.decode().unwrap_err();
        assert!(err.to_string().contains("0000"));
    }
}
