use crate::{
    convert::convert_record,
    error::ProcessorError,
    invocation::invocation_for,
    processor::{
        callback::{BatchCallback, RowCallback},
        config::ProcessorConfig,
        context::LoadContext,
        failure::{FailedBatchProcessor, RetryItem},
        state::WorkerState,
    },
};
use engine_core::{barrier::CompletionBarrier, error::TransportError};
use model::{
    core::value::Value,
    execution::failed_row::RowError,
    records::{
        batch::Batch,
        record::{QueueItem, Record},
    },
    schema::descriptor::PartitionDescriptor,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Outcome of one partition worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionReport {
    pub partition: u32,
    pub submitted: u64,
    pub errored: bool,
}

/// Counts the completion barrier down when dropped, so a worker that panics
/// still releases the driver.
struct BarrierGuard(CompletionBarrier);

impl Drop for BarrierGuard {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

struct FailureProcessorHandle {
    failed_tx: mpsc::UnboundedSender<RetryItem>,
    handle: JoinHandle<()>,
}

/// Drains one partition queue into load calls.
pub struct PartitionProcessor {
    descriptor: PartitionDescriptor,
    ctx: LoadContext,
    config: ProcessorConfig,
    queue: mpsc::Receiver<QueueItem>,
    worker: Arc<WorkerState>,
}

impl PartitionProcessor {
    pub fn new(
        descriptor: PartitionDescriptor,
        ctx: LoadContext,
        config: ProcessorConfig,
        queue: mpsc::Receiver<QueueItem>,
    ) -> Self {
        let worker = Arc::new(WorkerState::new(descriptor.partition_id));
        Self {
            descriptor,
            ctx,
            config,
            queue,
            worker,
        }
    }

    pub fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.worker)
    }

    pub async fn run(mut self) -> PartitionReport {
        let _barrier = BarrierGuard(self.ctx.barrier.clone());
        let partition = self.descriptor.partition_id;
        info!(
            partition,
            target = self.descriptor.target_name(),
            batch_size = self.config.batch_size,
            "Starting partition processor"
        );

        let failure = if self.descriptor.mode().is_batched() {
            let failure = self.spawn_failure_processor();
            self.process_load_table(&failure.failed_tx).await;
            Some(failure)
        } else {
            self.process_supplied_procedure().await;
            None
        };

        self.shutdown(failure).await;

        let report = PartitionReport {
            partition,
            submitted: self.worker.submitted(),
            errored: self.worker.is_errored(),
        };
        info!(partition, submitted = report.submitted, "Done processing partition");
        report
    }

    fn spawn_failure_processor(&self) -> FailureProcessorHandle {
        let (failed_tx, failed_rx) = mpsc::unbounded_channel();
        let processor = FailedBatchProcessor::new(
            self.descriptor.clone(),
            self.ctx.clone(),
            Arc::clone(&self.worker),
            failed_rx,
        );
        FailureProcessorHandle {
            failed_tx,
            handle: tokio::spawn(processor.run()),
        }
    }

    /// Takes the next group of queued items. `false` when the loop must end:
    /// the worker errored, the run is stopping, or the queue is exhausted.
    async fn next_items(&mut self, items: &mut Vec<QueueItem>) -> bool {
        if self.worker.is_errored() {
            // Make the reader stop producing; every other worker follows.
            self.ctx.coordinator.request_stop();
            return false;
        }

        let stop = self.ctx.stop_token().clone();
        if stop.is_cancelled() {
            return false;
        }

        items.clear();
        let received = tokio::select! {
            biased;
            _ = stop.cancelled() => return false,
            received = self.queue.recv_many(items, self.config.batch_size) => received,
        };

        if received == 0 {
            // Every sender dropped without an end-of-stream marker.
            items.push(QueueItem::EndOfStream);
        }
        true
    }

    async fn process_load_table(&mut self, failed_tx: &mpsc::UnboundedSender<RetryItem>) {
        let mut batch = Batch::with_capacity(self.config.batch_size);
        let mut items = Vec::with_capacity(self.config.batch_size);

        while self.next_items(&mut items).await {
            for item in items.drain(..) {
                let record = match item {
                    QueueItem::EndOfStream => {
                        if !batch.is_empty() {
                            if let Err(e) = self.submit_batch(batch.take(), failed_tx).await {
                                debug!(
                                    partition = self.descriptor.partition_id,
                                    error = %e,
                                    "Final batch not submitted"
                                );
                            }
                        }
                        return;
                    }
                    QueueItem::Data(record) => record,
                };

                let values = match convert_record(&record, self.descriptor.columns()) {
                    Ok(values) => values,
                    Err(e) => {
                        self.report(RowError::conversion(&record, e.to_string()));
                        continue;
                    }
                };
                batch.push(record, values);

                if batch.is_full() && self.submit_batch(batch.take(), failed_tx).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn process_supplied_procedure(&mut self) {
        let mut items = Vec::with_capacity(self.config.batch_size);

        while self.next_items(&mut items).await {
            for item in items.drain(..) {
                let record = match item {
                    QueueItem::EndOfStream => return,
                    QueueItem::Data(record) => record,
                };

                let values = match convert_record(&record, self.descriptor.columns()) {
                    Ok(values) => values,
                    Err(e) => {
                        self.report(RowError::conversion(&record, e.to_string()));
                        continue;
                    }
                };

                if self.submit_row(record, values).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn submit_batch(
        &self,
        batch: Batch,
        failed_tx: &mpsc::UnboundedSender<RetryItem>,
    ) -> Result<(), ProcessorError> {
        let rows = batch.len() as u64;
        let last = batch.sources().last().cloned();
        let invocation = invocation_for(self.descriptor.mode(), batch.rows().to_vec());
        let callback = BatchCallback::new(
            batch,
            Arc::clone(&self.worker),
            self.ctx.metrics.clone(),
            self.ctx.stop_token().clone(),
            failed_tx.clone(),
        );

        // Counted before the call: a rejection may be answered before submit returns.
        self.worker.add_in_flight(rows);
        self.worker.add_submitted(rows);
        self.ctx.metrics.add_submitted(rows);
        match self.ctx.client.submit(invocation, Box::new(callback)).await {
            Ok(()) => {
                self.ctx.metrics.increment_batches();
                debug!(partition = self.descriptor.partition_id, rows, "Batch submitted");
                Ok(())
            }
            Err(e) => {
                self.worker.release_in_flight(rows);
                self.worker.release_submitted(rows);
                self.ctx.metrics.sub_submitted(rows);
                Err(self.transport_failure(last, e))
            }
        }
    }

    async fn submit_row(
        &self,
        record: Record,
        values: Vec<Value>,
    ) -> Result<(), ProcessorError> {
        let invocation = invocation_for(self.descriptor.mode(), vec![values]);
        let callback = RowCallback::new(
            record.clone(),
            Arc::clone(&self.worker),
            self.ctx.metrics.clone(),
            Arc::clone(&self.ctx.coordinator),
        );

        self.worker.add_in_flight(1);
        self.worker.add_submitted(1);
        self.ctx.metrics.add_submitted(1);
        match self.ctx.client.submit(invocation, Box::new(callback)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.worker.release_in_flight(1);
                self.worker.release_submitted(1);
                self.ctx.metrics.sub_submitted(1);
                Err(self.transport_failure(Some(record), e))
            }
        }
    }

    /// The connection is gone: report it against the last record taken, mark
    /// this worker errored and stop the whole run.
    fn transport_failure(
        &self,
        last: Option<Record>,
        source: TransportError,
    ) -> ProcessorError {
        let partition = self.descriptor.partition_id;
        error!(partition, error = %source, "Lost connection while submitting");

        if let Some(record) = last {
            self.ctx
                .coordinator
                .report(RowError::transport(&record, source.to_string()));
        }
        self.worker.set_errored();
        self.ctx.coordinator.request_stop();

        ProcessorError::Submit { partition, source }
    }

    fn report(&self, row_error: RowError) {
        if self.ctx.coordinator.report(row_error) {
            self.worker.set_errored();
        }
    }

    /// Drain and shutdown sequence: drop unread input, wait for outstanding
    /// calls, stop the failure processor, then wait for its retries.
    async fn shutdown(&mut self, failure: Option<FailureProcessorHandle>) {
        let partition = self.descriptor.partition_id;

        self.queue.close();
        let mut discarded = 0usize;
        while self.queue.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(partition, items = discarded, "Discarded unread queue items");
        }

        let drained = self.drain().await;

        if let Some(FailureProcessorHandle { failed_tx, handle }) = failure {
            if drained.is_ok() && !failed_tx.is_closed() {
                let _ = failed_tx.send(RetryItem::EndOfStream);
            }
            drop(failed_tx);

            if let Err(e) = handle.await {
                error!(partition, error = %e, "Failure processor terminated abnormally");
                self.worker.set_errored();
            }

            if drained.is_ok() {
                let _ = self.drain().await;
            }
        }

        if self.worker.is_errored() {
            self.ctx.coordinator.request_stop();
        }
    }

    async fn drain(&self) -> Result<(), ProcessorError> {
        self.ctx.client.drain().await.map_err(|source| {
            let partition = self.descriptor.partition_id;
            warn!(partition, error = %source, "Failed to drain the client");
            self.ctx.coordinator.request_stop();
            ProcessorError::Drain { partition, source }
        })
    }
}
