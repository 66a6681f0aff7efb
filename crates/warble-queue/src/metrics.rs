//! Per-queue metrics counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters kept by each queue.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    resubmitted: AtomicU64,
}

impl QueueMetrics {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resubmitted(&self) {
        self.resubmitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            resubmitted: self.resubmitted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a queue's counters.
///
/// `timed_out` failures are also counted in `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Jobs accepted.
    pub enqueued: u64,
    /// Jobs whose handler returned success.
    pub completed: u64,
    /// Jobs whose handler errored or timed out.
    pub failed: u64,
    /// Failures caused by the handler timeout.
    pub timed_out: u64,
    /// Failed jobs re-queued by an operator.
    pub resubmitted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let metrics = QueueMetrics::default();
        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_completed();
        metrics.record_failed();
        metrics.record_timed_out();
        metrics.record_resubmitted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.timed_out, 1);
        assert_eq!(snapshot.resubmitted, 1);
    }

    #[test]
    fn fresh_snapshot_is_zeroed() {
        assert_eq!(QueueMetrics::default().snapshot(), MetricsSnapshot::default());
    }
}
