use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tracing::info;

#[derive(Debug, Default)]
struct InnerMetrics {
    submitted: AtomicU64,
    acknowledged: AtomicU64,
    batches_submitted: AtomicU64,
    batches_failed: AtomicU64,
    retried: AtomicU64,
    last_logged_multiple: AtomicU64,
}

/// Run-wide counters shared by every worker and completion callback.
///
/// The acknowledged count drives progress logging only; it is not the
/// authoritative row count of the target table.
#[derive(Debug, Clone)]
pub struct LoadMetrics {
    inner: Arc<InnerMetrics>,
    report_every: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub acknowledged: u64,
    pub batches_submitted: u64,
    pub batches_failed: u64,
    pub retried: u64,
}

impl LoadMetrics {
    pub fn new(report_every: u64) -> Self {
        LoadMetrics {
            inner: Arc::new(InnerMetrics::default()),
            report_every,
        }
    }

    pub fn add_submitted(&self, rows: u64) {
        self.inner.submitted.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn sub_submitted(&self, rows: u64) {
        let _ = self
            .inner
            .submitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(rows))
            });
    }

    pub fn increment_batches(&self) {
        self.inner.batches_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed_batches(&self) {
        self.inner.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries(&self) {
        self.inner.retried.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds acknowledged rows and returns the new total.
    pub fn add_acknowledged(&self, rows: u64) -> u64 {
        let total = self.inner.acknowledged.fetch_add(rows, Ordering::AcqRel) + rows;
        self.log_progress(total);
        total
    }

    pub fn acknowledged(&self) -> u64 {
        self.inner.acknowledged.load(Ordering::Acquire)
    }

    pub fn submitted(&self) -> u64 {
        self.inner.submitted.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            acknowledged: self.inner.acknowledged.load(Ordering::Relaxed),
            batches_submitted: self.inner.batches_submitted.load(Ordering::Relaxed),
            batches_failed: self.inner.batches_failed.load(Ordering::Relaxed),
            retried: self.inner.retried.load(Ordering::Relaxed),
        }
    }

    /// Logs when `total` crosses a new multiple of `report_every`. The CAS on
    /// the last logged multiple lets exactly one caller log each threshold,
    /// even when a batch jumps over several of them.
    fn log_progress(&self, total: u64) {
        if self.report_every == 0 {
            return;
        }

        let multiple = total / self.report_every;
        let mut last = self.inner.last_logged_multiple.load(Ordering::Acquire);
        while multiple > last {
            match self.inner.last_logged_multiple.compare_exchange_weak(
                last,
                multiple,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    info!(acknowledged = total, "Inserted rows");
                    return;
                }
                Err(current) => last = current,
            }
        }
    }

    #[cfg(test)]
    fn last_logged_multiple(&self) -> u64 {
        self.inner.last_logged_multiple.load(Ordering::Acquire)
    }
}

impl Default for LoadMetrics {
    fn default() -> Self {
        Self::new(10_000)
    }
}
