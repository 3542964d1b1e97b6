#![allow(dead_code)]

use engine_core::connectors::memory::{
    MemoryCluster, MemoryClusterBuilder, MemoryProcedure, MemoryTable, Topology,
};
use model::{
    core::{column_type::ColumnType, value::Value},
    schema::column::ColumnInfo,
};

pub mod utils;

/// Table every scenario loads into.
pub const PEOPLE: &str = "PEOPLE";

pub fn people_columns() -> Vec<ColumnInfo> {
    vec![
        ColumnInfo::new("id", ColumnType::BigInt),
        ColumnInfo::new("name", ColumnType::VarChar),
        ColumnInfo::new("age", ColumnType::Integer),
    ]
}

/// A cluster holding `people`, partitioned on `id` over `partitions` sites,
/// plus one single- and one multi-partition insert procedure.
pub fn people_cluster(partitions: u32) -> MemoryClusterBuilder {
    MemoryCluster::builder()
        .with_table(MemoryTable::new("people", people_columns()).partitioned_on(0))
        .with_procedure(MemoryProcedure::new(
            "InsertPerson",
            "people",
            people_columns(),
            true,
        ))
        .with_procedure(MemoryProcedure::new(
            "InsertPersonAnywhere",
            "people",
            people_columns(),
            false,
        ))
        .with_topology(Topology {
            host_count: 1,
            sites_per_host: partitions,
            kfactor: 0,
        })
}

/// Server-side validator rejecting every row whose id is in `ids`.
pub fn reject_ids(
    ids: &'static [i64],
) -> impl Fn(&str, &[Value]) -> Result<(), String> + Send + Sync + 'static {
    move |_, row| match row.first() {
        Some(Value::Int(id)) if ids.contains(id) => Err(format!("id {id} violates a constraint")),
        _ => Ok(()),
    }
}

/// One well-formed CSV line per id: `id,person <id>,<age>`.
pub fn people_csv(ids: impl IntoIterator<Item = i64>) -> String {
    ids.into_iter()
        .map(|id| format!("{id},person {id},{}\n", 20 + id % 50))
        .collect()
}
