//! One ordered scan-deliver-resolve pass over the queue.

use crate::{classify_status, DeliveryError, DeliveryResult, Outcome, OutcomeLogs, RemoteClient};
use echopost_core::{LogRecord, DEFAULT_REQUEST_TIMEOUT};
use echopost_queue::{DurableQueue, QueueKey};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tally of one replay pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    /// Entries read from the snapshot.
    pub scanned: usize,
    pub delivered: usize,
    /// Permanent failures, including entries that no longer decode.
    pub rejected: usize,
    /// The pass stopped early because cancellation was requested.
    pub cancelled: bool,
}

impl PassReport {
    /// Records resolved this pass and therefore deleted.
    pub fn resolved(&self) -> usize {
        self.delivered + self.rejected
    }
}

/// Drives replay passes against one queue and one remote.
pub struct ReplayEngine {
    queue: DurableQueue,
    remote: Arc<dyn RemoteClient>,
    logs: Arc<OutcomeLogs>,
    call_timeout: Duration,
}

impl ReplayEngine {
    pub fn new(queue: DurableQueue, remote: Arc<dyn RemoteClient>, logs: Arc<OutcomeLogs>) -> Self {
        Self {
            queue,
            remote,
            logs,
            call_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Upper bound on a single delivery call, on top of the client's own.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run one pass.
    ///
    /// Entries are visited in key order. Success and permanent failure mark an
    /// entry for deletion; a transient failure stops the scan and leaves the
    /// entry and everything after it untouched. Marked entries are deleted in
    /// one batch when the scan ends, however it ends. The first error seen is
    /// returned; permanent failures are never errors.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> DeliveryResult<PassReport> {
        if let Err(e) = self.queue.flush().await {
            warn!(error = %e, "queue_flush_error");
        }

        let mut report = PassReport::default();
        let mut resolved: Vec<QueueKey> = Vec::new();
        let scanned = self.scan(cancel, &mut report, &mut resolved).await;

        let deleted = self.queue.delete_batch(&resolved).await;
        match &deleted {
            Ok(_) if !resolved.is_empty() => {
                info!(
                    processed_count = resolved.len(),
                    delivered = report.delivered,
                    rejected = report.rejected,
                    "queue_processed"
                );
            }
            Ok(_) => info!("queue_processed_none"),
            Err(e) => error!(error = %e, pending = resolved.len(), "queue_delete_error"),
        }

        if let Err(e) = self.queue.flush().await {
            warn!(error = %e, "queue_flush_error");
        }

        scanned?;
        deleted?;
        Ok(report)
    }

    async fn scan(
        &self,
        cancel: &CancellationToken,
        report: &mut PassReport,
        resolved: &mut Vec<QueueKey>,
    ) -> DeliveryResult<()> {
        let mut snapshot = self.queue.iterate().await?;

        let result = loop {
            if cancel.is_cancelled() {
                debug!(scanned = report.scanned, "replay_cancelled");
                report.cancelled = true;
                break Ok(());
            }

            let entry = match snapshot.next().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break Ok(()),
                Err(e) => break Err(DeliveryError::from(e)),
            };
            report.scanned += 1;

            let record = match entry.decode() {
                Ok(record) => record,
                Err(e) => {
                    warn!(key = %entry.key, error = %e, "queue_read_error");
                    self.logs.record_undecodable(&entry.raw, &e.to_string());
                    report.rejected += 1;
                    resolved.push(entry.key);
                    continue;
                }
            };

            match self.deliver_one(&record).await {
                Ok(Outcome::Delivered) => {
                    report.delivered += 1;
                    resolved.push(entry.key);
                }
                Ok(_) => {
                    report.rejected += 1;
                    resolved.push(entry.key);
                }
                Err(e) => break Err(e),
            }
        };

        snapshot.close().await;
        result
    }

    /// Deliver one record and resolve it. Never returns `Outcome::Retry`;
    /// that case comes back as an error.
    async fn deliver_one(&self, record: &LogRecord) -> DeliveryResult<Outcome> {
        let response = tokio::time::timeout(self.call_timeout, self.remote.deliver(record))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.call_timeout.as_millis() as u64, "trigger_post_timeout");
                DeliveryError::Transport("delivery timed out".to_string())
            })??;

        let outcome = classify_status(response.status);
        match outcome {
            Outcome::Delivered => {
                self.logs.record_success(record);
                debug!(status = response.status, "trigger_success");
            }
            Outcome::Rejected => {
                self.logs
                    .record_failure(record, response.status, &response.body);
                warn!(status = response.status, "trigger_client_error_final");
            }
            Outcome::Retry => {
                warn!(status = response.status, "trigger_server_error");
                return Err(DeliveryError::ServerError {
                    status: response.status,
                });
            }
        }
        Ok(outcome)
    }
}
