use crate::error::CliError;
use engine_core::connectors::memory::{MemoryCluster, MemoryProcedure, MemoryTable, Topology};
use model::{core::column_type::ColumnType, schema::column::ColumnInfo};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Shape of the in-process cluster the CLI loads into.
///
/// ```json
/// {
///   "topology": { "host_count": 1, "sites_per_host": 4, "kfactor": 0 },
///   "tables": [
///     { "name": "people", "partition_column": "id",
///       "columns": [{ "name": "id", "type": "BIGINT" }, { "name": "name", "type": "VARCHAR" }] }
///   ],
///   "procedures": [{ "name": "InsertPerson", "table": "people", "single_partition": true }]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ClusterFile {
    #[serde(default)]
    topology: TopologySpec,
    tables: Vec<TableSpec>,
    #[serde(default)]
    procedures: Vec<ProcedureSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TopologySpec {
    host_count: u32,
    sites_per_host: u32,
    kfactor: u32,
}

impl Default for TopologySpec {
    fn default() -> Self {
        let topology = Topology::default();
        Self {
            host_count: topology.host_count,
            sites_per_host: topology.sites_per_host,
            kfactor: topology.kfactor,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
    partition_column: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ColumnSpec {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Deserialize)]
struct ProcedureSpec {
    name: String,
    table: String,
    #[serde(default = "default_single_partition")]
    single_partition: bool,
}

fn default_single_partition() -> bool {
    true
}

impl ClusterFile {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn build(self) -> Result<MemoryCluster, CliError> {
        let topology = Topology {
            host_count: self.topology.host_count,
            sites_per_host: self.topology.sites_per_host,
            kfactor: self.topology.kfactor,
        };
        let mut builder = MemoryCluster::builder().with_topology(topology);
        let mut tables = Vec::with_capacity(self.tables.len());

        for entry in self.tables {
            let columns = entry
                .columns
                .iter()
                .map(|c| {
                    ColumnType::from_catalog_name(&c.type_name)
                        .map(|column_type| ColumnInfo::new(c.name.clone(), column_type))
                        .map_err(CliError::InvalidCluster)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let mut table = MemoryTable::new(entry.name.clone(), columns);
            if let Some(partition_column) = &entry.partition_column {
                let index = entry
                    .columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(partition_column))
                    .ok_or_else(|| {
                        CliError::InvalidCluster(format!(
                            "table {} has no column {partition_column}",
                            entry.name
                        ))
                    })?;
                table = table.partitioned_on(index);
            }
            tables.push(table);
        }

        for entry in self.procedures {
            let table = tables
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(&entry.table))
                .ok_or_else(|| {
                    CliError::InvalidCluster(format!(
                        "procedure {} inserts into unknown table {}",
                        entry.name, entry.table
                    ))
                })?;
            builder = builder.with_procedure(MemoryProcedure::new(
                entry.name,
                table.name.clone(),
                table.columns.clone(),
                entry.single_partition,
            ));
        }

        info!(
            tables = tables.len(),
            partitions = topology.partition_count(),
            "Started in-process cluster"
        );
        for table in tables {
            builder = builder.with_table(table);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER: &str = r#"{
        "topology": { "host_count": 2, "sites_per_host": 2 },
        "tables": [
            { "name": "people", "partition_column": "ID",
              "columns": [{ "name": "id", "type": "bigint" }, { "name": "name", "type": "VARCHAR" }] }
        ],
        "procedures": [{ "name": "InsertPerson", "table": "PEOPLE" }]
    }"#;

    #[test]
    fn builds_cluster_from_description() {
        let file: ClusterFile = serde_json::from_str(CLUSTER).unwrap();
        let cluster = file.build().unwrap();
        assert_eq!(cluster.partition_count(), 4);
    }

    #[test]
    fn rejects_unknown_partition_column() {
        let file: ClusterFile = serde_json::from_str(
            r#"{ "tables": [{ "name": "t", "partition_column": "k",
                 "columns": [{ "name": "id", "type": "BIGINT" }] }] }"#,
        )
        .unwrap();
        assert!(matches!(file.build(), Err(CliError::InvalidCluster(_))));
    }

    #[test]
    fn rejects_unknown_column_type() {
        let file: ClusterFile = serde_json::from_str(
            r#"{ "tables": [{ "name": "t", "columns": [{ "name": "g", "type": "GEOGRAPHY" }] }] }"#,
        )
        .unwrap();
        assert!(matches!(file.build(), Err(CliError::InvalidCluster(_))));
    }
}
