use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Counters and the errored flag of one partition worker, shared with its
/// failure processor and with completion callbacks.
#[derive(Debug)]
pub struct WorkerState {
    partition: u32,
    errored: AtomicBool,
    submitted: AtomicU64,
    in_flight: AtomicU64,
}

impl WorkerState {
    pub fn new(partition: u32) -> Self {
        Self {
            partition,
            errored: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
        }
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn is_errored(&self) -> bool {
        self.errored.load(Ordering::Acquire)
    }

    pub fn set_errored(&self) {
        self.errored.store(true, Ordering::Release);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    pub fn add_submitted(&self, rows: u64) {
        self.submitted.fetch_add(rows, Ordering::AcqRel);
    }

    /// Takes back rows whose batch was rejected; the retries count them again.
    pub fn release_submitted(&self, rows: u64) {
        let _ = self
            .submitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(rows))
            });
    }

    /// Rows submitted but not yet answered.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn add_in_flight(&self, rows: u64) {
        self.in_flight.fetch_add(rows, Ordering::AcqRel);
    }

    pub fn release_in_flight(&self, rows: u64) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(rows))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_never_underflows() {
        let state = WorkerState::new(0);
        state.add_in_flight(3);
        state.release_in_flight(5);
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn released_submissions_never_underflow() {
        let state = WorkerState::new(0);
        state.add_submitted(5);
        state.release_submitted(3);
        assert_eq!(state.submitted(), 2);
        state.release_submitted(4);
        assert_eq!(state.submitted(), 0);
    }
}
