use crate::processor::{failure::RetryItem, state::WorkerState};
use engine_core::{
    budget::ErrorCoordinator,
    connectors::client::{CallResponse, ProcedureCallback},
    metrics::LoadMetrics,
};
use model::{
    execution::failed_row::RowError,
    records::{batch::Batch, record::Record},
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Completion of a multi-row table load.
///
/// A rejected batch does not say which rows were bad, so every row is handed
/// to the failure processor for an individual retry.
pub struct BatchCallback {
    batch: Batch,
    worker: Arc<WorkerState>,
    metrics: LoadMetrics,
    stop: CancellationToken,
    failed_tx: mpsc::UnboundedSender<RetryItem>,
}

impl BatchCallback {
    pub fn new(
        batch: Batch,
        worker: Arc<WorkerState>,
        metrics: LoadMetrics,
        stop: CancellationToken,
        failed_tx: mpsc::UnboundedSender<RetryItem>,
    ) -> Self {
        Self {
            batch,
            worker,
            metrics,
            stop,
            failed_tx,
        }
    }
}

impl ProcedureCallback for BatchCallback {
    fn on_complete(self: Box<Self>, response: CallResponse) {
        let rows = self.batch.len() as u64;
        self.worker.release_in_flight(rows);

        if response.is_success() {
            self.metrics.add_acknowledged(response.rows_affected);
            return;
        }

        self.metrics.increment_failed_batches();
        self.worker.release_submitted(rows);
        self.metrics.sub_submitted(rows);
        let partition = self.worker.partition();

        if self.stop.is_cancelled() || self.worker.is_errored() || self.failed_tx.is_closed() {
            debug!(partition, rows, status = %response.status, "Dropping rows of failed batch");
            return;
        }

        debug!(
            partition,
            rows,
            status = %response.status,
            message = %response.status_string,
            "Batch failed, retrying rows individually"
        );

        let (values, sources) = self.batch.into_parts();
        for (source, values) in sources.into_iter().zip(values) {
            if self.failed_tx.send(RetryItem::Row { source, values }).is_err() {
                break;
            }
        }
    }
}

/// Completion of a single-row call: a failure-processor retry or a call to a
/// user procedure.
pub struct RowCallback {
    source: Record,
    worker: Arc<WorkerState>,
    metrics: LoadMetrics,
    coordinator: Arc<ErrorCoordinator>,
}

impl RowCallback {
    pub fn new(
        source: Record,
        worker: Arc<WorkerState>,
        metrics: LoadMetrics,
        coordinator: Arc<ErrorCoordinator>,
    ) -> Self {
        Self {
            source,
            worker,
            metrics,
            coordinator,
        }
    }
}

impl ProcedureCallback for RowCallback {
    fn on_complete(self: Box<Self>, response: CallResponse) {
        self.worker.release_in_flight(1);

        if response.is_success() {
            self.metrics.add_acknowledged(1);
            return;
        }

        let row_error = RowError::rejected(&self.source, response.status_string.clone());
        if self.coordinator.report(row_error) {
            self.worker.set_errored();
            return;
        }
        error!(
            partition = self.worker.partition(),
            line = self.source.line,
            status = %response.status,
            "{}",
            response.status_string
        );
    }
}
