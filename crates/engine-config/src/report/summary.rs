use crate::error::ReportError;
use chrono::{DateTime, Utc};
use engine_core::metrics::MetricsSnapshot;
use model::execution::failed_row::RowError;
use serde::Serialize;
use std::{fs, path::Path, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Every partition drained and the error budget held.
    Completed,
    /// The stop flag was raised: budget exceeded, connection lost or
    /// shutdown requested.
    Aborted,
}

/// Final report of one load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub run_id: Uuid,
    pub target: String,
    pub partitions: u32,
    pub outcome: LoadOutcome,
    pub submitted: u64,
    pub acknowledged: u64,
    pub batches_submitted: u64,
    pub batches_failed: u64,
    pub retried: u64,
    pub error_count: u64,
    pub budget_exceeded: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// First errors in line order.
    pub errors: Vec<RowError>,
}

impl LoadSummary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        target: String,
        partitions: u32,
        outcome: LoadOutcome,
        metrics: MetricsSnapshot,
        error_count: u64,
        budget_exceeded: bool,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        errors: Vec<RowError>,
    ) -> Self {
        Self {
            run_id,
            target,
            partitions,
            outcome,
            submitted: metrics.submitted,
            acknowledged: metrics.acknowledged,
            batches_submitted: metrics.batches_submitted,
            batches_failed: metrics.batches_failed,
            retried: metrics.retried,
            error_count,
            budget_exceeded,
            started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == LoadOutcome::Completed
    }

    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            target = %self.target,
            submitted = self.submitted,
            acknowledged = self.acknowledged,
            errors = self.error_count,
            elapsed_ms = self.elapsed_ms,
            "Load finished"
        );

        if self.budget_exceeded {
            warn!(errors = self.error_count, "Load aborted: maximum error count reached");
        }
        for error in &self.errors {
            warn!(line = error.line, message = %error.message, "Failed row: {}", error.raw);
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "Wrote load report");
        Ok(())
    }
}
