use crate::{core::value::Value, records::record::Record};

/// Rows converted for one load call, kept together with the records they
/// were built from so a rejected batch can be retried row by row.
#[derive(Debug, Clone)]
pub struct Batch {
    rows: Vec<Vec<Value>>,
    sources: Vec<Record>,
    capacity: usize,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: Vec::with_capacity(capacity),
            sources: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, source: Record, row: Vec<Value>) {
        self.rows.push(row);
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn sources(&self) -> &[Record] {
        &self.sources
    }

    /// Hands out the accumulated rows and leaves an empty batch of the same
    /// capacity in place.
    pub fn take(&mut self) -> Batch {
        let fresh = Batch::with_capacity(self.capacity);
        std::mem::replace(self, fresh)
    }

    pub fn into_parts(self) -> (Vec<Vec<Value>>, Vec<Record>) {
        (self.rows, self.sources)
    }
}
