use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a row was reported to the error coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The reader could not split the record into the expected fields.
    Malformed,
    /// A field could not be converted to its column type.
    Conversion,
    /// The cluster rejected the row on its own.
    Rejected,
    /// The connection failed while the row was being submitted.
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Malformed => write!(f, "malformed"),
            FailureKind::Conversion => write!(f, "conversion"),
            FailureKind::Rejected => write!(f, "rejected"),
            FailureKind::Transport => write!(f, "transport"),
        }
    }
}

/// A row that permanently failed to load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowError {
    pub line: u64,
    pub raw: String,
    pub message: String,
    pub kind: FailureKind,
    pub failed_at: DateTime<Utc>,
}

impl RowError {
    pub fn new(
        line: u64,
        raw: impl Into<String>,
        message: impl Into<String>,
        kind: FailureKind,
    ) -> Self {
        Self {
            line,
            raw: raw.into(),
            message: message.into(),
            kind,
            failed_at: Utc::now(),
        }
    }

    pub fn conversion(record: &crate::records::record::Record, message: impl Into<String>) -> Self {
        Self::new(record.line, record.raw.clone(), message, FailureKind::Conversion)
    }

    pub fn rejected(record: &crate::records::record::Record, message: impl Into<String>) -> Self {
        Self::new(record.line, record.raw.clone(), message, FailureKind::Rejected)
    }

    pub fn transport(record: &crate::records::record::Record, message: impl Into<String>) -> Self {
        Self::new(record.line, record.raw.clone(), message, FailureKind::Transport)
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} ({}): {}", self.line, self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::record::Record;

    #[test]
    fn builds_errors_from_records() {
        let record = Record::from_fields(7, &["1", "x"]);
        let err = RowError::conversion(&record, "bad int");
        assert_eq!(err.line, 7);
        assert_eq!(err.raw, "1,x");
        assert_eq!(err.kind, FailureKind::Conversion);
        assert_eq!(err.to_string(), "line 7 (conversion): bad int");
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let err = RowError::new(1, "a", "boom", FailureKind::Rejected);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "rejected");
    }
}
