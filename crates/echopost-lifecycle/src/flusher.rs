//! Periodic queue flush, independent of the control loop.

use echopost_queue::DurableQueue;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Flushes the queue on a fixed period until cancelled.
///
/// Bounds how much acknowledged data an unclean exit can lose to roughly one
/// period. It never reads or changes lifecycle state.
pub struct BackgroundFlusher {
    queue: DurableQueue,
    period: Duration,
}

impl BackgroundFlusher {
    pub fn new(queue: DurableQueue, period: Duration) -> Self {
        Self { queue, period }
    }

    /// Run on a new task. The handle resolves to the number of flushes done.
    pub fn spawn(queue: DurableQueue, period: Duration, cancel: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(Self::new(queue, period).run(cancel))
    }

    pub async fn run(self, cancel: CancellationToken) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut flushes = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(flushes, "flusher_stopping");
                    return flushes;
                }
                _ = ticker.tick() => {
                    match self.queue.flush().await {
                        Ok(()) => {
                            flushes += 1;
                            debug!(flushes, "flusher_tick");
                        }
                        Err(e) => warn!(error = %e, "queue_flush_error"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echopost_core::LogRecord;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_flusher_ticks_until_cancelled() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite")).await.unwrap();
        queue
            .enqueue(&LogRecord::from_producer("{}", vec![]))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let handle = BackgroundFlusher::spawn(queue.clone(), Duration::from_millis(20), cancel.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let flushes = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(flushes >= 2, "expected several flushes, got {flushes}");
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_flusher_stops_before_first_tick() {
        let dir = tempdir().unwrap();
        let queue = DurableQueue::open(&dir.path().join("q.sqlite")).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let flushes = BackgroundFlusher::new(queue, Duration::from_secs(60))
            .run(cancel)
            .await;
        assert_eq!(flushes, 0);
    }
}
