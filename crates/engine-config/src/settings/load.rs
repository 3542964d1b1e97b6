use crate::{error::SettingsError, settings::validated::ValidatedSettings};
use model::schema::descriptor::LoadTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_REPORT_EVERY: u64 = 10_000;
pub const DEFAULT_MAX_ERRORS: u64 = 100;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
pub const DEFAULT_MAX_ERROR_DETAILS: usize = 10;

/// How input text is split into records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    pub delimiter: char,
    /// Skip the first record as a header line.
    pub header: bool,
    /// Number of leading records to skip (after the header).
    pub skip: u64,
    /// Stop after this many records.
    pub limit_rows: Option<u64>,
    /// Field text that stands for SQL NULL.
    pub null_string: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            header: false,
            skip: 0,
            limit_rows: None,
            null_string: None,
        }
    }
}

/// Raw load settings as read from a JSON file, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub target: Option<LoadTarget>,
    pub batch_size: usize,
    pub report_every: u64,
    pub max_errors: u64,
    pub queue_capacity: usize,
    pub max_error_details: usize,
    pub rejected_rows_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub csv: CsvOptions,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            target: None,
            batch_size: DEFAULT_BATCH_SIZE,
            report_every: DEFAULT_REPORT_EVERY,
            max_errors: DEFAULT_MAX_ERRORS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_error_details: DEFAULT_MAX_ERROR_DETAILS,
            rejected_rows_path: None,
            report_path: None,
            csv: CsvOptions::default(),
        }
    }
}

impl LoadSettings {
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_target(mut self, target: LoadTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_report_every(mut self, report_every: u64) -> Self {
        self.report_every = report_every;
        self
    }

    pub fn with_max_errors(mut self, max_errors: u64) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_error_details(mut self, max_error_details: usize) -> Self {
        self.max_error_details = max_error_details;
        self
    }

    pub fn with_rejected_rows_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rejected_rows_path = Some(path.into());
        self
    }

    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(path.into());
        self
    }

    pub fn with_csv(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn validate(self) -> Result<ValidatedSettings, SettingsError> {
        let target = self.target.ok_or(SettingsError::MissingTarget)?;
        if target.name().trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "target",
                reason: "name must not be empty".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(SettingsError::Invalid {
                field: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.csv.delimiter.is_ascii() {
            return Err(SettingsError::Invalid {
                field: "csv.delimiter",
                reason: format!("'{}' is not a single-byte character", self.csv.delimiter),
            });
        }

        Ok(ValidatedSettings {
            target,
            batch_size: self.batch_size,
            report_every: self.report_every,
            max_errors: self.max_errors,
            queue_capacity: self.queue_capacity,
            max_error_details: self.max_error_details,
            rejected_rows_path: self.rejected_rows_path,
            report_path: self.report_path,
            csv: self.csv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults_to_missing_fields() {
        let settings = LoadSettings::from_json(r#"{ "target": { "table": "people" } }"#).unwrap();
        assert_eq!(settings.batch_size, 200);
        assert_eq!(settings.report_every, 10_000);
        assert_eq!(settings.max_errors, 100);
        assert_eq!(settings.csv.delimiter, ',');

        let validated = settings.validate().unwrap();
        assert_eq!(validated.target(), &LoadTarget::Table("people".into()));
        assert!(!validated.uses_supplied_procedure());
    }

    #[test]
    fn parses_procedure_target_and_csv_options() {
        let settings = LoadSettings::from_json(
            r#"{
                "target": { "procedure": "AddPerson" },
                "batch_size": 50,
                "csv": { "delimiter": "|", "header": true, "null_string": "\\N" }
            }"#,
        )
        .unwrap()
        .validate()
        .unwrap();

        assert!(settings.uses_supplied_procedure());
        assert_eq!(settings.batch_size(), 50);
        assert!(settings.csv().header);
        assert_eq!(settings.csv().null_string.as_deref(), Some("\\N"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            LoadSettings::default().validate(),
            Err(SettingsError::MissingTarget)
        ));
        assert!(matches!(
            LoadSettings::default()
                .with_target(LoadTarget::Table("t".into()))
                .with_batch_size(0)
                .validate(),
            Err(SettingsError::Invalid {
                field: "batch_size",
                ..
            })
        ));
        assert!(matches!(
            LoadSettings::default()
                .with_target(LoadTarget::Procedure(" ".into()))
                .validate(),
            Err(SettingsError::Invalid { field: "target", .. })
        ));
    }

    #[test]
    fn reports_unreadable_file() {
        let err = LoadSettings::from_file(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }
}
