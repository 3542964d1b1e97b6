use serde::{Deserialize, Serialize};

/// One parsed input record, immutable once the reader has produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based position of the record in the input, used in error reports.
    pub line: u64,
    /// The record exactly as it appeared in the input.
    pub raw: String,
    /// Field text in column order; `None` is SQL NULL.
    pub fields: Vec<Option<String>>,
}

impl Record {
    pub fn new(line: u64, raw: impl Into<String>, fields: Vec<Option<String>>) -> Self {
        Self {
            line,
            raw: raw.into(),
            fields,
        }
    }

    /// Builds a record from plain field text, rendering the raw line as CSV.
    pub fn from_fields<S: AsRef<str>>(line: u64, fields: &[S]) -> Self {
        let raw = fields
            .iter()
            .map(|f| f.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            line,
            raw,
            fields: fields.iter().map(|f| Some(f.as_ref().to_string())).collect(),
        }
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).and_then(|f| f.as_deref())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Element type of every partition queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Data(Record),
    EndOfStream,
}

impl From<Record> for QueueItem {
    fn from(record: Record) -> Self {
        QueueItem::Data(record)
    }
}
