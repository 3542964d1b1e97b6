use crate::core::column_type::ColumnType;
use thiserror::Error;

/// A single field that could not be converted to its column type.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValueError {
    #[error("invalid {column_type} value '{value}'")]
    Invalid {
        column_type: ColumnType,
        value: String,
    },

    #[error("value '{value}' is out of range for {column_type}")]
    OutOfRange {
        column_type: ColumnType,
        value: String,
    },
}

/// A record that could not be turned into a row of native values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("Missing or Invalid Data in Row. Expected {expected} fields, found {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("Column {column}: {source}")]
    Column {
        column: String,
        #[source]
        source: ValueError,
    },
}
