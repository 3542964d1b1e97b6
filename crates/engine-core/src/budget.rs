use model::execution::failed_row::RowError;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[derive(Debug, Default)]
struct BudgetState {
    errors: BTreeMap<u64, RowError>,
    count: u64,
    exceeded: bool,
}

/// Process-wide error budget and stop flag.
///
/// Every worker, callback and the router report permanently failed rows here.
/// When the count reaches `max_errors` the stop token is cancelled exactly once
/// and every later report returns `true` without being recorded.
#[derive(Debug)]
pub struct ErrorCoordinator {
    max_errors: u64,
    stop: CancellationToken,
    state: Mutex<BudgetState>,
}

impl ErrorCoordinator {
    pub fn new(max_errors: u64, stop: CancellationToken) -> Self {
        Self {
            max_errors,
            stop,
            state: Mutex::new(BudgetState::default()),
        }
    }

    /// Records a failed row. Returns whether the budget is exceeded.
    pub fn report(&self, row_error: RowError) -> bool {
        let mut state = self.lock();
        if state.exceeded {
            return true;
        }

        warn!(
            line = row_error.line,
            kind = %row_error.kind,
            message = %row_error.message,
            "Row failed"
        );

        state.count += 1;
        state.errors.insert(row_error.line, row_error);

        if state.count >= self.max_errors {
            state.exceeded = true;
            drop(state);

            error!(max_errors = self.max_errors, "Maximum error count reached, aborting load");
            self.stop.cancel();
            return true;
        }

        false
    }

    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Requests a stop without touching the budget (transport loss, signals).
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn budget_exceeded(&self) -> bool {
        self.lock().exceeded
    }

    pub fn error_count(&self) -> u64 {
        self.lock().count
    }

    pub fn max_errors(&self) -> u64 {
        self.max_errors
    }

    /// Recorded errors in line order.
    pub fn errors(&self) -> Vec<RowError> {
        self.lock().errors.values().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
