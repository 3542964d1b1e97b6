use engine_core::{
    connectors::client::{Invocation, Payload},
    hashing::key_bytes,
};
use model::{
    core::value::Value,
    schema::descriptor::{LOAD_MULTI_PARTITION_TABLE, LOAD_SINGLE_PARTITION_TABLE, LoadMode},
};

/// Builds the call that loads `rows` under `mode`.
///
/// Single-partition loads are routed by the partition key of the first row;
/// every row of the batch belongs to the same partition. Procedure mode takes
/// exactly one row, whose values become the procedure parameters.
pub fn invocation_for(mode: &LoadMode, rows: Vec<Vec<Value>>) -> Invocation {
    match mode {
        LoadMode::SinglePartitionTable {
            table,
            partition_column,
        } => {
            let routing_key = rows
                .first()
                .and_then(|row| row.get(partition_column.index))
                .map(|value| key_bytes(value, partition_column.column_type))
                .unwrap_or_default();
            Invocation {
                procedure: LOAD_SINGLE_PARTITION_TABLE.to_string(),
                routing_key: Some(routing_key),
                payload: Payload::Table {
                    table: table.clone(),
                    rows,
                },
            }
        }
        LoadMode::MultiPartitionTable { table } => Invocation {
            procedure: LOAD_MULTI_PARTITION_TABLE.to_string(),
            routing_key: None,
            payload: Payload::Table {
                table: table.clone(),
                rows,
            },
        },
        LoadMode::Procedure { name, .. } => {
            debug_assert_eq!(rows.len(), 1, "procedure calls carry one row");
            Invocation {
                procedure: name.clone(),
                routing_key: None,
                payload: Payload::Params(rows.into_iter().next().unwrap_or_default()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::column_type::ColumnType, schema::column::PartitionColumn};

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::String("a".into()), Value::Int(7)],
            vec![Value::String("b".into()), Value::Int(7)],
        ]
    }

    #[test]
    fn single_partition_load_is_routed_by_first_row() {
        let mode = LoadMode::SinglePartitionTable {
            table: "PEOPLE".into(),
            partition_column: PartitionColumn {
                index: 1,
                column_type: ColumnType::Integer,
            },
        };

        let invocation = invocation_for(&mode, rows());

        assert_eq!(invocation.procedure, "@LoadSinglepartitionTable");
        assert_eq!(
            invocation.routing_key.as_deref(),
            Some(&7i64.to_be_bytes()[..])
        );
        assert_eq!(invocation.payload.row_count(), 2);
    }

    #[test]
    fn multi_partition_load_has_no_routing_key() {
        let mode = LoadMode::MultiPartitionTable {
            table: "TOWNS".into(),
        };
        let invocation = invocation_for(&mode, rows());
        assert_eq!(invocation.procedure, "@LoadMultipartitionTable");
        assert!(!invocation.is_single_partition());
    }

    #[test]
    fn procedure_call_passes_row_as_parameters() {
        let mode = LoadMode::Procedure {
            name: "AddPerson".into(),
            multi_partition: false,
        };
        let invocation = invocation_for(&mode, vec![vec![Value::Int(1), Value::Null]]);
        assert_eq!(invocation.procedure, "AddPerson");
        assert_eq!(
            invocation.payload,
            Payload::Params(vec![Value::Int(1), Value::Null])
        );
    }
}
