use engine_core::{
    barrier::CompletionBarrier, budget::ErrorCoordinator, connectors::client::LoadClient,
    metrics::LoadMetrics,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// State shared by every worker of one load run.
#[derive(Clone)]
pub struct LoadContext {
    pub client: Arc<dyn LoadClient>,
    pub coordinator: Arc<ErrorCoordinator>,
    pub metrics: LoadMetrics,
    pub barrier: CompletionBarrier,
}

impl LoadContext {
    pub fn new(
        client: Arc<dyn LoadClient>,
        coordinator: Arc<ErrorCoordinator>,
        metrics: LoadMetrics,
        barrier: CompletionBarrier,
    ) -> Self {
        Self {
            client,
            coordinator,
            metrics,
            barrier,
        }
    }

    pub fn stop_token(&self) -> &CancellationToken {
        self.coordinator.stop_token()
    }

    pub fn is_stopped(&self) -> bool {
        self.coordinator.is_stopped()
    }
}
