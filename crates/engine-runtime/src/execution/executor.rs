use crate::{
    error::LoadError,
    execution::workers::{self, Workers},
    router::csv::CsvRouter,
    schema::resolver,
};
use chrono::Utc;
use engine_config::{
    report::{
        rejected::RejectedRowWriter,
        summary::{LoadOutcome, LoadSummary},
    },
    settings::validated::ValidatedSettings,
};
use engine_core::{
    barrier::CompletionBarrier,
    budget::ErrorCoordinator,
    connectors::{catalog::Catalog, client::LoadClient},
    metrics::LoadMetrics,
};
use engine_processing::processor::{config::ProcessorConfig, context::LoadContext};
use model::schema::descriptor::LoadDescriptor;
use std::{io::Read, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Loads every record of `input` into the target named by `settings`.
///
/// Cancelling `stop` ends the run early; the summary then reports
/// [`LoadOutcome::Aborted`].
pub async fn run<R: Read + Send + 'static>(
    client: Arc<dyn LoadClient>,
    catalog: Arc<dyn Catalog>,
    settings: ValidatedSettings,
    input: R,
    stop: CancellationToken,
) -> Result<LoadSummary, LoadError> {
    LoadExecutor::new(client, catalog, settings, stop)
        .execute(input)
        .await
}

pub struct LoadExecutor {
    client: Arc<dyn LoadClient>,
    catalog: Arc<dyn Catalog>,
    settings: ValidatedSettings,
    stop: CancellationToken,
}

impl LoadExecutor {
    pub fn new(
        client: Arc<dyn LoadClient>,
        catalog: Arc<dyn Catalog>,
        settings: ValidatedSettings,
        stop: CancellationToken,
    ) -> Self {
        Self {
            client,
            catalog,
            settings,
            stop,
        }
    }

    pub async fn execute<R: Read + Send + 'static>(
        self,
        input: R,
    ) -> Result<LoadSummary, LoadError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(%run_id, target = %self.settings.target(), "Starting load run");

        let descriptor = Arc::new(
            resolver::resolve(self.catalog.as_ref(), self.settings.target()).await?,
        );

        let coordinator = Arc::new(ErrorCoordinator::new(
            self.settings.max_errors(),
            self.stop.clone(),
        ));
        let metrics = LoadMetrics::new(self.settings.report_every());
        let barrier = CompletionBarrier::new(descriptor.partition_count as usize);
        let ctx = LoadContext::new(
            Arc::clone(&self.client),
            Arc::clone(&coordinator),
            metrics.clone(),
            barrier.clone(),
        );

        let Workers { queues, handles } = workers::spawn(
            &descriptor,
            &ctx,
            ProcessorConfig::default().with_batch_size(self.settings.batch_size()),
            self.settings.queue_capacity(),
        );

        let router = CsvRouter::new(
            self.settings.csv().clone(),
            Arc::clone(&descriptor),
            queues,
            Arc::clone(&coordinator),
        );
        let routed = router.run(input).await;
        if let Err(err) = &routed {
            error!(%err, "Reading input failed, stopping load");
            coordinator.request_stop();
        }

        barrier.wait().await;
        let reports = futures::future::try_join_all(handles).await?;
        for report in reports.iter().filter(|r| r.errored) {
            warn!(partition = report.partition, "Partition worker ended in error");
        }

        let summary = self.summarize(run_id, &descriptor, &coordinator, &metrics, started_at, start);
        summary.log();
        self.write_reports(&summary, &coordinator)?;

        routed?;
        Ok(summary)
    }

    fn summarize(
        &self,
        run_id: Uuid,
        descriptor: &LoadDescriptor,
        coordinator: &ErrorCoordinator,
        metrics: &LoadMetrics,
        started_at: chrono::DateTime<Utc>,
        start: Instant,
    ) -> LoadSummary {
        let outcome = if coordinator.is_stopped() {
            LoadOutcome::Aborted
        } else {
            LoadOutcome::Completed
        };

        let errors = coordinator
            .errors()
            .into_iter()
            .take(self.settings.max_error_details())
            .collect();

        LoadSummary::new(
            run_id,
            self.settings.target().to_string(),
            descriptor.partition_count,
            outcome,
            metrics.snapshot(),
            coordinator.error_count(),
            coordinator.budget_exceeded(),
            started_at,
            start.elapsed(),
            errors,
        )
    }

    fn write_reports(
        &self,
        summary: &LoadSummary,
        coordinator: &ErrorCoordinator,
    ) -> Result<(), LoadError> {
        if let Some(path) = self.settings.rejected_rows_path() {
            let errors = coordinator.errors();
            if !errors.is_empty() {
                RejectedRowWriter::new(path).write_all(&errors)?;
            }
        }
        if let Some(path) = self.settings.report_path() {
            summary.write_json(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::settings::load::LoadSettings;
    use engine_core::connectors::memory::{MemoryCluster, MemoryTable, Topology};
    use model::{
        core::column_type::ColumnType,
        schema::{column::ColumnInfo, descriptor::LoadTarget},
    };
    use tracing_test::traced_test;

    fn cluster() -> MemoryCluster {
        MemoryCluster::builder()
            .with_table(
                MemoryTable::new(
                    "people",
                    vec![
                        ColumnInfo::new("id", ColumnType::BigInt),
                        ColumnInfo::new("name", ColumnType::VarChar),
                    ],
                )
                .partitioned_on(0),
            )
            .with_topology(Topology {
                host_count: 1,
                sites_per_host: 4,
                kfactor: 0,
            })
            .build()
    }

    fn settings() -> LoadSettings {
        LoadSettings::default()
            .with_target(LoadTarget::Table("people".into()))
            .with_batch_size(7)
    }

    async fn load(
        cluster: &MemoryCluster,
        settings: LoadSettings,
        input: &str,
    ) -> Result<LoadSummary, LoadError> {
        let client = Arc::new(cluster.clone());
        run(
            client.clone(),
            client,
            settings.validate().unwrap(),
            std::io::Cursor::new(input.to_owned()),
            CancellationToken::new(),
        )
        .await
    }

    #[traced_test]
    #[tokio::test]
    async fn loads_all_rows_across_partitions() {
        let cluster = cluster();
        let input: String = (1..=100).map(|i| format!("{i},person {i}\n")).collect();

        let summary = load(&cluster, settings(), &input).await.unwrap();

        assert_eq!(summary.outcome, LoadOutcome::Completed);
        assert_eq!(summary.partitions, 4);
        assert_eq!(summary.acknowledged, 100);
        assert_eq!(cluster.row_count("PEOPLE"), 100);
        assert!(logs_contain("Done processing partition"));
    }

    #[traced_test]
    #[tokio::test]
    async fn bad_rows_are_summarized_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let rejected = dir.path().join("rejected.csv");
        let report = dir.path().join("report.json");
        let cluster = cluster();

        let summary = load(
            &cluster,
            settings()
                .with_rejected_rows_path(&rejected)
                .with_report_path(&report),
            "1,a\nx,b\n3\n4,d\n",
        )
        .await
        .unwrap();

        assert_eq!(summary.outcome, LoadOutcome::Completed);
        assert_eq!(summary.error_count, 2);
        assert_eq!(summary.acknowledged, 2);
        assert_eq!(
            summary.errors.iter().map(|e| e.line).collect::<Vec<_>>(),
            vec![2, 3]
        );

        let rows = std::fs::read_to_string(&rejected).unwrap();
        assert_eq!(rows.lines().collect::<Vec<_>>(), vec!["x,b", "3"]);
        assert!(report.exists());
    }

    #[traced_test]
    #[tokio::test]
    async fn exhausting_the_budget_aborts() {
        let cluster = cluster();
        let input: String = (1..=50).map(|i| format!("bad{i},x\n")).collect();

        let summary = load(&cluster, settings().with_max_errors(5), &input)
            .await
            .unwrap();

        assert_eq!(summary.outcome, LoadOutcome::Aborted);
        assert!(summary.budget_exceeded);
        assert_eq!(summary.error_count, 5);
        assert!(!summary.is_success());
    }

    #[traced_test]
    #[tokio::test]
    async fn unknown_target_fails_before_loading() {
        let cluster = cluster();
        let result = load(
            &cluster,
            settings().with_target(LoadTarget::Table("nope".into())),
            "1,a\n",
        )
        .await;

        assert!(matches!(result, Err(LoadError::Schema(_))));
        assert_eq!(cluster.row_count("PEOPLE"), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn cancelled_run_is_aborted() {
        let cluster = cluster();
        let stop = CancellationToken::new();
        stop.cancel();
        let client = Arc::new(cluster.clone());

        let summary = run(
            client.clone(),
            client,
            settings().validate().unwrap(),
            "1,a\n2,b\n".as_bytes(),
            stop,
        )
        .await
        .unwrap();

        assert_eq!(summary.outcome, LoadOutcome::Aborted);
        assert_eq!(summary.acknowledged, 0);
    }
}
