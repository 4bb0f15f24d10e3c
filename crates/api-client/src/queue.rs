//! Requests deferred while the device is offline
//!
//! Best-effort and memory-only: entries do not survive a restart. The queue
//! is bounded; when full, the oldest entry is dropped to make room.

use crate::error::ApiError;
use crate::request::RequestConfig;
use chrono::{DateTime, Utc};
use leadflow_core::retry::RetryPolicy;
use leadflow_telemetry::metrics;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A request waiting for connectivity
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    /// Queue entry ID
    pub id: Uuid,
    /// The request as originally issued
    pub config: RequestConfig,
    /// When the request was deferred
    pub enqueued_at: DateTime<Utc>,
    /// Replays attempted so far
    pub attempts: u32,
}

/// Outcome of one [`PendingRequestQueue::drain`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Entries replayed successfully and removed
    pub sent: usize,
    /// Entries removed after a failure that replaying can't fix
    pub dropped: usize,
    /// Entries still waiting
    pub remaining: usize,
}

/// Bounded FIFO of deferred requests
pub struct PendingRequestQueue {
    max_size: usize,
    entries: Mutex<VecDeque<QueuedRequest>>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl PendingRequestQueue {
    /// Create a queue holding at most `max_size` requests
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: Mutex::new(VecDeque::new()),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Configured capacity
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Defer `config`, evicting the oldest entries if the queue is full.
    pub fn enqueue(&self, config: RequestConfig) -> Uuid {
        let entry = QueuedRequest {
            id: Uuid::new_v4(),
            config,
            enqueued_at: Utc::now(),
            attempts: 0,
        };
        let id = entry.id;

        let mut entries = self.lock();
        if self.max_size == 0 {
            warn!(id = %id, "Offline queue has no capacity; request discarded");
            return id;
        }

        while entries.len() >= self.max_size {
            if let Some(evicted) = entries.pop_front() {
                warn!(
                    id = %evicted.id,
                    method = %evicted.config.method,
                    path = %evicted.config.path,
                    "Offline queue full, dropping oldest request"
                );
                metrics().increment("api.queue.evicted");
            }
        }

        debug!(id = %id, method = %entry.config.method, path = %entry.config.path, "Request queued");
        entries.push_back(entry);
        metrics().set_gauge("api.queue.depth", entries.len() as u64);
        id
    }

    /// Number of waiting requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the waiting requests, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedRequest> {
        self.lock().iter().cloned().collect()
    }

    /// Discard everything waiting
    pub fn clear(&self) {
        self.lock().clear();
        metrics().set_gauge("api.queue.depth", 0);
    }

    /// Replay waiting requests in FIFO order.
    ///
    /// Successfully replayed entries are removed. A failure that `policy` would
    /// retry (or an offline rejection) stops the pass and leaves that entry at
    /// the head with its attempt count bumped; any other failure drops the entry. Only one drain runs at a time, and
    /// requests enqueued during a drain are picked up by the same pass.
    pub async fn drain<F, Fut>(&self, policy: &RetryPolicy, mut replay: F) -> DrainReport
    where
        F: FnMut(RequestConfig) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let _draining = self.drain_lock.lock().await;
        let mut report = DrainReport::default();

        loop {
            // Never hold the entries lock across the replay
            let Some(mut entry) = self.lock().pop_front() else {
                break;
            };

            match replay(entry.config.clone()).await {
                Ok(()) => {
                    debug!(id = %entry.id, "Queued request replayed");
                    report.sent += 1;
                }
                Err(err) if err.is_offline() || err.is_retryable(policy) => {
                    entry.attempts += 1;
                    debug!(id = %entry.id, attempts = entry.attempts, error = %err, "Replay deferred");
                    self.requeue_front(entry);
                    break;
                }
                Err(err) => {
                    warn!(
                        id = %entry.id,
                        path = %entry.config.path,
                        error = %err,
                        "Dropping queued request after permanent failure"
                    );
                    report.dropped += 1;
                }
            }
        }

        report.remaining = self.len();
        metrics().set_gauge("api.queue.depth", report.remaining as u64);
        if report.sent > 0 || report.dropped > 0 {
            info!(
                sent = report.sent,
                dropped = report.dropped,
                remaining = report.remaining,
                "Offline queue drained"
            );
        }
        report
    }

    fn requeue_front(&self, entry: QueuedRequest) {
        let mut entries = self.lock();
        if entries.len() >= self.max_size {
            // The head is the oldest entry, so it is the one that gives way
            warn!(id = %entry.id, "Offline queue filled during replay; dropping oldest request");
            metrics().increment("api.queue.evicted");
            return;
        }
        entries.push_front(entry);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueuedRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn paths(queue: &PendingRequestQueue) -> Vec<String> {
        queue.snapshot().into_iter().map(|e| e.config.path).collect()
    }

    #[test]
    fn test_enqueue_fifo() {
        let queue = PendingRequestQueue::new(10);
        queue.enqueue(RequestConfig::post("a"));
        queue.enqueue(RequestConfig::post("b"));

        assert_eq!(queue.len(), 2);
        assert_eq!(paths(&queue), vec!["a", "b"]);
        assert!(queue.snapshot().iter().all(|e| e.attempts == 0));
    }

    #[test]
    fn test_oldest_evicted_when_full() {
        let queue = PendingRequestQueue::new(2);
        queue.enqueue(RequestConfig::post("a"));
        queue.enqueue(RequestConfig::post("b"));
        queue.enqueue(RequestConfig::post("c"));

        assert_eq!(queue.len(), 2);
        assert_eq!(paths(&queue), vec!["b", "c"]);
    }

    #[test]
    fn test_zero_capacity_discards() {
        let queue = PendingRequestQueue::new(0);
        queue.enqueue(RequestConfig::post("a"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_replays_in_order() {
        let queue = PendingRequestQueue::new(10);
        for p in ["a", "b", "c"] {
            queue.enqueue(RequestConfig::post(p));
        }

        let mut seen = Vec::new();
        let report = queue
            .drain(&RetryPolicy::default(), |config| {
                seen.push(config.path);
                async { Ok(()) }
            })
            .await;

        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(report, DrainReport { sent: 3, dropped: 0, remaining: 0 });
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_stops_and_keeps_entry() {
        let queue = PendingRequestQueue::new(10);
        for p in ["a", "b", "c"] {
            queue.enqueue(RequestConfig::post(p));
        }

        let report = queue
            .drain(&RetryPolicy::default(), |config| async move {
                if config.path == "b" {
                    Err(ApiError::Network("connection reset".into()))
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report, DrainReport { sent: 1, dropped: 0, remaining: 2 });
        assert_eq!(paths(&queue), vec!["b", "c"]);
        assert_eq!(queue.snapshot()[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_drops_entry() {
        let queue = PendingRequestQueue::new(10);
        queue.enqueue(RequestConfig::post("bad"));
        queue.enqueue(RequestConfig::post("good"));

        let report = queue
            .drain(&RetryPolicy::default(), |config| async move {
                if config.path == "bad" {
                    Err(ApiError::http(422, "invalid lead"))
                } else {
                    Ok(())
                }
            })
            .await;

        assert_eq!(report, DrainReport { sent: 1, dropped: 1, remaining: 0 });
    }

    #[tokio::test]
    async fn test_status_outside_retry_set_is_dropped() {
        let queue = PendingRequestQueue::new(10);
        queue.enqueue(RequestConfig::post("unsupported"));
        queue.enqueue(RequestConfig::post("next"));

        let mut seen = Vec::new();
        let report = queue
            .drain(&RetryPolicy::default(), |config| {
                seen.push(config.path.clone());
                async move {
                    if config.path == "unsupported" {
                        Err(ApiError::http(501, "not implemented"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(seen, vec!["unsupported", "next"]);
        assert_eq!(report, DrainReport { sent: 1, dropped: 1, remaining: 0 });
    }

    #[tokio::test]
    async fn test_offline_again_keeps_entry() {
        let queue = PendingRequestQueue::new(10);
        queue.enqueue(RequestConfig::post("a"));

        let report = queue
            .drain(&RetryPolicy::default(), |_| async {
                Err::<(), _>(ApiError::Offline { queued_id: None })
            })
            .await;

        assert_eq!(report, DrainReport { sent: 0, dropped: 0, remaining: 1 });
        assert_eq!(queue.snapshot()[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_enqueue_during_drain_is_not_lost() {
        let queue = Arc::new(PendingRequestQueue::new(10));
        queue.enqueue(RequestConfig::post("first"));

        let inner = Arc::clone(&queue);
        let report = queue
            .drain(&RetryPolicy::default(), move |config| {
                if config.path == "first" {
                    inner.enqueue(RequestConfig::post("late"));
                }
                async { Ok(()) }
            })
            .await;

        assert_eq!(report.sent, 2);
        assert!(queue.is_empty());
    }
}
