use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Notify;

#[derive(Debug)]
struct BarrierInner {
    remaining: AtomicUsize,
    notify: Notify,
}

/// Countdown the driver waits on until every partition worker has drained.
#[derive(Debug, Clone)]
pub struct CompletionBarrier {
    inner: Arc<BarrierInner>,
}

impl CompletionBarrier {
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(BarrierInner {
                remaining: AtomicUsize::new(count),
                notify: Notify::new(),
            }),
        }
    }

    /// Saturates at zero; extra calls are ignored.
    pub fn count_down(&self) {
        let previous = self
            .inner
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        if previous == Ok(1) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining.load(Ordering::Acquire)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.remaining() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn releases_after_every_count_down() {
        let barrier = CompletionBarrier::new(3);
        for i in 0..3 {
            let barrier = barrier.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5 * i)).await;
                barrier.count_down();
            });
        }

        tokio::time::timeout(Duration::from_secs(1), barrier.wait())
            .await
            .expect("barrier should open");
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn zero_count_is_open() {
        let barrier = CompletionBarrier::new(0);
        barrier.count_down();
        barrier.wait().await;
        assert_eq!(barrier.remaining(), 0);
    }
}
