use model::{
    core::value::Value, execution::errors::ConversionError, records::record::Record,
    schema::column::ColumnInfo,
};

/// Converts every field of `record` to the native type of its column.
pub fn convert_record(
    record: &Record,
    columns: &[ColumnInfo],
) -> Result<Vec<Value>, ConversionError> {
    if record.is_empty() || record.len() != columns.len() {
        return Err(ConversionError::FieldCount {
            expected: columns.len(),
            actual: record.len(),
        });
    }

    record
        .fields
        .iter()
        .zip(columns)
        .map(|(field, column)| {
            column
                .column_type
                .parse(field.as_deref())
                .map_err(|source| ConversionError::Column {
                    column: column.name.clone(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::column_type::ColumnType, execution::errors::ValueError};

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("id", ColumnType::Integer),
            ColumnInfo::new("name", ColumnType::VarChar),
        ]
    }

    #[test]
    fn converts_fields_in_column_order() {
        let row = convert_record(&Record::from_fields(1, &["42", "ada"]), &columns()).unwrap();
        assert_eq!(row, vec![Value::Int(42), Value::String("ada".into())]);
    }

    #[test]
    fn null_fields_stay_null() {
        let record = Record::new(1, "1,", vec![Some("1".into()), None]);
        let row = convert_record(&record, &columns()).unwrap();
        assert_eq!(row[1], Value::Null);
    }

    #[test]
    fn names_the_failing_column() {
        let err = convert_record(&Record::from_fields(3, &["x1", "ada"]), &columns()).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Column {
                ref column,
                source: ValueError::Invalid { .. }
            } if column == "id"
        ));
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = convert_record(&Record::from_fields(3, &["1"]), &columns()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing or Invalid Data in Row. Expected 2 fields, found 1"
        );
    }
}
