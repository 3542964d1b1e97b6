use crate::PEOPLE;
use engine_config::{
    report::summary::LoadSummary,
    settings::load::LoadSettings,
};
use engine_core::connectors::{
    client::{Invocation, Payload},
    memory::MemoryCluster,
};
use engine_runtime::{error::LoadError, execution::executor::run};
use model::{core::value::Value, schema::descriptor::LoadTarget};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Upper bound for any single load in these tests; hitting it means a hang.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

pub fn table_settings() -> LoadSettings {
    LoadSettings::default().with_target(LoadTarget::Table(PEOPLE.to_lowercase()))
}

pub fn procedure_settings(procedure: &str) -> LoadSettings {
    LoadSettings::default().with_target(LoadTarget::Procedure(procedure.to_string()))
}

/// Runs the whole load pipeline against `cluster`, panicking on a hang.
pub async fn try_load(
    cluster: &MemoryCluster,
    settings: LoadSettings,
    input: &str,
    stop: CancellationToken,
) -> Result<LoadSummary, LoadError> {
    let client = Arc::new(cluster.clone());
    let settings = settings.validate().expect("valid settings");

    tokio::time::timeout(
        LOAD_TIMEOUT,
        run(
            client.clone(),
            client,
            settings,
            std::io::Cursor::new(input.to_owned()),
            stop,
        ),
    )
    .await
    .expect("load did not finish in time")
}

pub async fn load(cluster: &MemoryCluster, settings: LoadSettings, input: &str) -> LoadSummary {
    try_load(cluster, settings, input, CancellationToken::new())
        .await
        .expect("load run failed")
}

/// Ids stored in `people`, sorted.
pub fn stored_ids(cluster: &MemoryCluster) -> Vec<i64> {
    let mut ids: Vec<i64> = cluster
        .rows(PEOPLE)
        .iter()
        .filter_map(|row| row.first().and_then(Value::as_i64))
        .collect();
    ids.sort_unstable();
    ids
}

/// The id of every row carried by `invocation`.
pub fn invocation_ids(invocation: &Invocation) -> Vec<i64> {
    match &invocation.payload {
        Payload::Table { rows, .. } => rows
            .iter()
            .filter_map(|row| row.first().and_then(Value::as_i64))
            .collect(),
        Payload::Params(params) => params.first().and_then(Value::as_i64).into_iter().collect(),
    }
}

pub fn assert_row_count(cluster: &MemoryCluster, expected: usize) {
    let actual = cluster.row_count(PEOPLE);
    assert_eq!(actual, expected, "expected {expected} stored rows, found {actual}");
}
