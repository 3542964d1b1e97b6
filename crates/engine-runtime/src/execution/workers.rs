use engine_processing::processor::{
    config::ProcessorConfig,
    context::LoadContext,
    partition::{PartitionProcessor, PartitionReport},
};
use model::{records::record::QueueItem, schema::descriptor::LoadDescriptor};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::info;

/// Running partition workers and the queues that feed them, by partition id.
pub struct Workers {
    pub queues: Vec<mpsc::Sender<QueueItem>>,
    pub handles: Vec<JoinHandle<PartitionReport>>,
}

/// Starts one worker per partition, each behind a bounded queue.
pub fn spawn(
    descriptor: &Arc<LoadDescriptor>,
    ctx: &LoadContext,
    config: ProcessorConfig,
    queue_capacity: usize,
) -> Workers {
    let partitions = descriptor.partition_count;
    info!(partitions, queue_capacity, "Launching partition workers");

    let mut queues = Vec::with_capacity(partitions as usize);
    let mut handles = Vec::with_capacity(partitions as usize);

    for partition in 0..partitions {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let processor = PartitionProcessor::new(
            descriptor.for_partition(partition),
            ctx.clone(),
            config.clone(),
            rx,
        );
        queues.push(tx);
        handles.push(tokio::spawn(processor.run()));
    }

    Workers { queues, handles }
}
