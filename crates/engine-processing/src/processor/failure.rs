use crate::{
    invocation::invocation_for,
    processor::{callback::RowCallback, context::LoadContext, state::WorkerState},
};
use model::{core::value::Value, records::record::Record, schema::descriptor::PartitionDescriptor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Element of a failure processor's queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryItem {
    Row { source: Record, values: Vec<Value> },
    EndOfStream,
}

/// Retries, one row at a time, the rows of batches the cluster rejected.
pub struct FailedBatchProcessor {
    descriptor: PartitionDescriptor,
    ctx: LoadContext,
    worker: Arc<WorkerState>,
    failed_rx: mpsc::UnboundedReceiver<RetryItem>,
}

impl FailedBatchProcessor {
    pub fn new(
        descriptor: PartitionDescriptor,
        ctx: LoadContext,
        worker: Arc<WorkerState>,
        failed_rx: mpsc::UnboundedReceiver<RetryItem>,
    ) -> Self {
        Self {
            descriptor,
            ctx,
            worker,
            failed_rx,
        }
    }

    pub async fn run(mut self) {
        let partition = self.descriptor.partition_id;
        let stop = self.ctx.stop_token().clone();

        loop {
            let item = tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                item = self.failed_rx.recv() => item,
            };

            let (source, values) = match item {
                Some(RetryItem::Row { source, values }) if !self.worker.is_errored() => {
                    (source, values)
                }
                _ => {
                    info!(partition, "Shutting down failure processor");
                    break;
                }
            };

            let invocation = invocation_for(self.descriptor.mode(), vec![values]);
            let callback = RowCallback::new(
                source,
                Arc::clone(&self.worker),
                self.ctx.metrics.clone(),
                Arc::clone(&self.ctx.coordinator),
            );

            self.worker.add_in_flight(1);
            self.worker.add_submitted(1);
            self.ctx.metrics.add_submitted(1);
            if let Err(e) = self.ctx.client.submit(invocation, Box::new(callback)).await {
                self.worker.release_in_flight(1);
                self.worker.release_submitted(1);
                self.ctx.metrics.sub_submitted(1);
                warn!(partition, error = %e, "Failure processor failed, failures will not be processed");
                self.worker.set_errored();
                self.abandon();
                break;
            }

            self.ctx.metrics.increment_retries();
        }
    }

    /// Closes the queue so callbacks stop feeding it, and drops what is left.
    fn abandon(&mut self) {
        self.failed_rx.close();
        let mut dropped = 0usize;
        while let Ok(item) = self.failed_rx.try_recv() {
            if matches!(item, RetryItem::Row { .. }) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(
                partition = self.descriptor.partition_id,
                rows = dropped,
                "Dropped rows awaiting retry"
            );
        }
    }
}
