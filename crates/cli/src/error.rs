use engine_config::error::SettingsError;
use engine_runtime::error::{LoadError, SchemaError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read a file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid load settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to parse the cluster description: {0}")]
    ClusterParse(#[from] serde_json::Error),

    #[error("Invalid cluster description: {0}")]
    InvalidCluster(String),

    #[error("Failed to resolve the load target: {0}")]
    Schema(#[from] SchemaError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),
}
