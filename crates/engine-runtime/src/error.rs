use engine_config::error::{ReportError, SettingsError};
use engine_core::error::CatalogError;
use thiserror::Error;

/// Failures of the one-time schema and topology lookup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Table {0} was not found in the catalog")]
    SchemaNotFound(String),

    #[error("Procedure {0} was not found in the catalog")]
    ProcedureNotFound(String),

    #[error("Column {column} has unsupported type {type_name}")]
    UnsupportedColumnType { column: String, type_name: String },

    #[error("Invalid cluster topology: {0}")]
    InvalidTopology(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("I/O error while reading input: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The blocking reader task panicked.
    #[error("Reader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Top-level errors of a load run. Row failures are not errors here; they
/// are counted in the summary.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// A worker task panicked or was cancelled.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
