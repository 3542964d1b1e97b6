use crate::error::ReportError;
use model::execution::failed_row::RowError;
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

#[derive(Serialize)]
struct RejectedEntry<'a> {
    line: u64,
    kind: String,
    message: &'a str,
}

/// Appends rejected rows to `path` as their raw text, and one JSON line per
/// row (line number and message) to a sibling `.log.jsonl` file.
#[derive(Debug, Clone)]
pub struct RejectedRowWriter {
    rows_path: PathBuf,
    log_path: PathBuf,
}

impl RejectedRowWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let rows_path = path.into();
        let log_path = rows_path.with_extension("log.jsonl");
        Self {
            rows_path,
            log_path,
        }
    }

    pub fn rows_path(&self) -> &Path {
        &self.rows_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn write_all(&self, errors: &[RowError]) -> Result<(), ReportError> {
        if errors.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.rows_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut rows = BufWriter::new(open_append(&self.rows_path)?);
        let mut log = BufWriter::new(open_append(&self.log_path)?);

        for error in errors {
            writeln!(rows, "{}", error.raw)?;
            let entry = RejectedEntry {
                line: error.line,
                kind: error.kind.to_string(),
                message: &error.message,
            };
            writeln!(log, "{}", serde_json::to_string(&entry)?)?;
        }

        rows.flush()?;
        log.flush()?;
        debug!(rows = errors.len(), path = %self.rows_path.display(), "Wrote rejected rows");
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::failed_row::FailureKind;

    #[test]
    fn writes_raw_rows_and_json_log() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RejectedRowWriter::new(dir.path().join("rejected.csv"));

        writer
            .write_all(&[
                RowError::new(4, "4,bad", "constraint", FailureKind::Rejected),
                RowError::new(9, "9,x,y", "field count", FailureKind::Malformed),
            ])
            .unwrap();

        let rows = std::fs::read_to_string(writer.rows_path()).unwrap();
        assert_eq!(rows, "4,bad\n9,x,y\n");

        let log = std::fs::read_to_string(writer.log_path()).unwrap();
        let entries: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["line"], 9);
        assert_eq!(entries[1]["kind"], "malformed");
        assert!(writer.log_path().ends_with("rejected.log.jsonl"));
    }

    #[test]
    fn nothing_to_write_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RejectedRowWriter::new(dir.path().join("rejected.csv"));
        writer.write_all(&[]).unwrap();
        assert!(!writer.rows_path().exists());
    }
}
