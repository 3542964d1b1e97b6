use crate::{core::value::Value, execution::errors::ValueError};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Maximum digits right of the decimal point for `DECIMAL` columns.
pub const DECIMAL_SCALE: i64 = 12;
/// Maximum total digits for `DECIMAL` columns.
pub const DECIMAL_PRECISION: i64 = 38;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    VarChar,
    VarBinary,
    Timestamp,
}

lazy_static! {
    static ref CATALOG_TYPE_MAP: HashMap<&'static str, ColumnType> = build_catalog_type_map();
}

impl ColumnType {
    /// Resolves a type name as reported by the cluster catalog.
    pub fn from_catalog_name(type_name: &str) -> Result<Self, String> {
        let normalized = type_name.trim().to_uppercase();
        CATALOG_TYPE_MAP
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| format!("Unknown column type: {type_name}"))
    }

    pub fn catalog_name(&self) -> &'static str {
        match self {
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "FLOAT",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::VarChar => "VARCHAR",
            ColumnType::VarBinary => "VARBINARY",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }

    /// Converts the text of one field to this column's native value.
    ///
    /// `None` is SQL NULL. An empty field is NULL for every type except
    /// `VARCHAR`, where it is the empty string.
    pub fn parse(&self, text: Option<&str>) -> Result<Value, ValueError> {
        let Some(text) = text else {
            return Ok(Value::Null);
        };

        if *self == ColumnType::VarChar {
            return Ok(Value::String(text.to_string()));
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }

        match self {
            ColumnType::TinyInt => self.parse_int(trimmed, i8::MIN as i64, i8::MAX as i64),
            ColumnType::SmallInt => self.parse_int(trimmed, i16::MIN as i64, i16::MAX as i64),
            ColumnType::Integer => self.parse_int(trimmed, i32::MIN as i64, i32::MAX as i64),
            ColumnType::BigInt => self.parse_int(trimmed, i64::MIN, i64::MAX),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.invalid(text)),
            ColumnType::Decimal => self.parse_decimal(trimmed),
            ColumnType::VarBinary => decode_hex(trimmed)
                .map(Value::Bytes)
                .ok_or_else(|| self.invalid(text)),
            ColumnType::Timestamp => self.parse_timestamp(trimmed),
            ColumnType::VarChar => Ok(Value::String(text.to_string())),
        }
    }

    fn parse_int(&self, text: &str, min: i64, max: i64) -> Result<Value, ValueError> {
        let value = text.parse::<i128>().map_err(|_| self.invalid(text))?;
        if value < min as i128 || value > max as i128 {
            return Err(ValueError::OutOfRange {
                column_type: *self,
                value: text.to_string(),
            });
        }
        Ok(Value::Int(value as i64))
    }

    fn parse_decimal(&self, text: &str) -> Result<Value, ValueError> {
        let decimal = BigDecimal::from_str(text).map_err(|_| self.invalid(text))?;
        let (_, scale) = decimal.as_bigint_and_exponent();
        let whole_digits = decimal.digits() as i64 - scale;

        if scale > DECIMAL_SCALE || whole_digits > DECIMAL_PRECISION - DECIMAL_SCALE {
            return Err(ValueError::OutOfRange {
                column_type: *self,
                value: text.to_string(),
            });
        }
        Ok(Value::Decimal(decimal))
    }

    fn parse_timestamp(&self, text: &str) -> Result<Value, ValueError> {
        // Integral input is microseconds since the epoch.
        if let Ok(micros) = text.parse::<i64>() {
            return DateTime::from_timestamp_micros(micros)
                .map(Value::Timestamp)
                .ok_or_else(|| ValueError::OutOfRange {
                    column_type: *self,
                    value: text.to_string(),
                });
        }

        if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(Value::Timestamp(ts.and_utc()));
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ts| Value::Timestamp(ts.and_utc()))
            .ok_or_else(|| self.invalid(text))
    }

    fn invalid(&self, text: &str) -> ValueError {
        ValueError::Invalid {
            column_type: *self,
            value: text.to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.catalog_name())
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|h| u8::from_str_radix(h, 16).ok()))
        .collect()
}

fn build_catalog_type_map() -> HashMap<&'static str, ColumnType> {
    use ColumnType::*;

    let entries = [
        ("TINYINT", TinyInt),
        ("SMALLINT", SmallInt),
        ("INTEGER", Integer),
        ("INT", Integer),
        ("BIGINT", BigInt),
        ("FLOAT", Float),
        ("DOUBLE", Float),
        ("DECIMAL", Decimal),
        ("NUMERIC", Decimal),
        ("VARCHAR", VarChar),
        ("STRING", VarChar),
        ("VARBINARY", VarBinary),
        ("TIMESTAMP", Timestamp),
    ];

    let mut map = HashMap::new();
    for (name, column_type) in entries {
        map.insert(name, column_type);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_catalog_names_case_insensitively() {
        assert_eq!(
            ColumnType::from_catalog_name(" bigint "),
            Ok(ColumnType::BigInt)
        );
        assert!(ColumnType::from_catalog_name("GEOGRAPHY").is_err());
    }

    #[test]
    fn integer_width_is_enforced() {
        assert_eq!(ColumnType::TinyInt.parse(Some("127")), Ok(Value::Int(127)));
        assert!(matches!(
            ColumnType::TinyInt.parse(Some("128")),
            Err(ValueError::OutOfRange { .. })
        ));
        assert!(matches!(
            ColumnType::Integer.parse(Some("12abc")),
            Err(ValueError::Invalid { .. })
        ));
    }

    #[test]
    fn empty_field_is_null_except_for_varchar() {
        assert_eq!(ColumnType::BigInt.parse(Some("  ")), Ok(Value::Null));
        assert_eq!(
            ColumnType::VarChar.parse(Some("")),
            Ok(Value::String(String::new()))
        );
        assert_eq!(ColumnType::VarChar.parse(None), Ok(Value::Null));
    }

    #[test]
    fn decimal_scale_is_limited() {
        assert!(ColumnType::Decimal.parse(Some("12.500000000000")).is_ok());
        assert!(ColumnType::Decimal.parse(Some("1.0000000000001")).is_err());
    }

    #[test]
    fn timestamps_accept_micros_and_text() {
        let from_micros = ColumnType::Timestamp.parse(Some("1000000")).unwrap();
        let from_text = ColumnType::Timestamp
            .parse(Some("1970-01-01 00:00:01.000000"))
            .unwrap();
        assert_eq!(from_micros, from_text);
        assert!(ColumnType::Timestamp.parse(Some("yesterday")).is_err());
    }

    #[test]
    fn varbinary_is_hex() {
        assert_eq!(
            ColumnType::VarBinary.parse(Some("0aFF")),
            Ok(Value::Bytes(vec![0x0a, 0xff]))
        );
        assert!(ColumnType::VarBinary.parse(Some("abc")).is_err());
    }
}
