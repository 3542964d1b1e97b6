use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A field value converted to the native representation of its column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// Every integer column width is carried as `i64`; the width is enforced
    /// at conversion time.
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(v) => {
                for byte in v {
                    write!(f, "{byte:02X}")?;
                }
                Ok(())
            }
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.6f")),
            Value::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_bytes_as_upper_hex() {
        assert_eq!(Value::Bytes(vec![0x0a, 0xff]).to_string(), "0AFF");
    }

    #[test]
    fn displays_timestamps_with_micros() {
        let ts = DateTime::from_timestamp_micros(1_500_000).unwrap();
        assert_eq!(
            Value::Timestamp(ts).to_string(),
            "1970-01-01 00:00:01.500000"
        );
    }
}
