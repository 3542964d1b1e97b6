use crate::settings::load::CsvOptions;
use model::schema::descriptor::LoadTarget;
use std::path::{Path, PathBuf};

/// Immutable, validated configuration used throughout the load.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSettings {
    pub(crate) target: LoadTarget,
    pub(crate) batch_size: usize,
    pub(crate) report_every: u64,
    pub(crate) max_errors: u64,
    pub(crate) queue_capacity: usize,
    pub(crate) max_error_details: usize,
    pub(crate) rejected_rows_path: Option<PathBuf>,
    pub(crate) report_path: Option<PathBuf>,
    pub(crate) csv: CsvOptions,
}

impl ValidatedSettings {
    pub fn target(&self) -> &LoadTarget {
        &self.target
    }

    /// One call per row to a user procedure instead of batched table loads.
    pub fn uses_supplied_procedure(&self) -> bool {
        self.target.uses_supplied_procedure()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn report_every(&self) -> u64 {
        self.report_every
    }

    pub fn max_errors(&self) -> u64 {
        self.max_errors
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn max_error_details(&self) -> usize {
        self.max_error_details
    }

    pub fn rejected_rows_path(&self) -> Option<&Path> {
        self.rejected_rows_path.as_deref()
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }

    pub fn csv(&self) -> &CsvOptions {
        &self.csv
    }
}
