use crate::error::SchemaError;
use engine_core::connectors::catalog::{Catalog, CatalogColumn, DeploymentProperty};
use model::{
    core::column_type::ColumnType,
    schema::{
        column::{ColumnInfo, PartitionColumn},
        descriptor::{LoadDescriptor, LoadMode, LoadTarget},
    },
};
use tracing::{info, warn};

const PARTITION_COLUMN_REMARK: &str = "PARTITION_COLUMN";
const MULTI_PARTITION_MARKER: &str = "\"singlePartition\":false";

/// Looks up column types, the partition column and the partition count of
/// `target`. Runs once before any worker starts.
pub async fn resolve(
    catalog: &dyn Catalog,
    target: &LoadTarget,
) -> Result<LoadDescriptor, SchemaError> {
    match target {
        LoadTarget::Table(table) => resolve_table(catalog, table).await,
        LoadTarget::Procedure(procedure) => resolve_procedure(catalog, procedure).await,
    }
}

async fn resolve_table(catalog: &dyn Catalog, table: &str) -> Result<LoadDescriptor, SchemaError> {
    let mut listing: Vec<CatalogColumn> = catalog
        .columns()
        .await?
        .into_iter()
        .filter(|c| c.table_name.eq_ignore_ascii_case(table))
        .collect();

    if listing.is_empty() {
        return Err(SchemaError::SchemaNotFound(table.to_string()));
    }
    listing.sort_by_key(|c| c.ordinal_position);

    let table_name = listing[0].table_name.clone();
    let mut columns = Vec::with_capacity(listing.len());
    let mut partition_column = None;

    for (index, column) in listing.iter().enumerate() {
        let column_type = column_type(&column.column_name, &column.type_name)?;
        let is_partition_column = column
            .remarks
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(PARTITION_COLUMN_REMARK));

        if is_partition_column {
            info!(
                table = %table_name,
                column = %column.column_name,
                column_type = %column_type,
                "Table partition column"
            );
            partition_column = Some(PartitionColumn { index, column_type });
        }
        columns.push(ColumnInfo::new(column.column_name.clone(), column_type));
    }

    let (mode, partition_count) = match partition_column {
        Some(partition_column) => {
            let partition_count = partition_count(&catalog.deployment().await?)?;
            let mode = LoadMode::SinglePartitionTable {
                table: table_name,
                partition_column,
            };
            (mode, partition_count)
        }
        None => {
            info!(table = %table_name, "Table is not partitioned, loading through one worker");
            (LoadMode::MultiPartitionTable { table: table_name }, 1)
        }
    };

    info!(partitions = partition_count, "Resolved load target");
    Ok(LoadDescriptor {
        mode,
        columns,
        partition_count,
    })
}

async fn resolve_procedure(
    catalog: &dyn Catalog,
    procedure: &str,
) -> Result<LoadDescriptor, SchemaError> {
    let entry = catalog
        .procedures()
        .await?
        .into_iter()
        .find(|p| p.procedure_name == procedure)
        .ok_or_else(|| SchemaError::ProcedureNotFound(procedure.to_string()))?;

    let multi_partition = entry
        .remarks
        .as_deref()
        .is_some_and(|r| r.contains(MULTI_PARTITION_MARKER));
    if multi_partition {
        warn!(
            procedure,
            "Using a multi-partitioned procedure to load data will be slow. \
             If loading a partitioned table, use a single-partitioned procedure \
             for best performance."
        );
    }

    let columns = catalog
        .procedure_columns()
        .await?
        .into_iter()
        .filter(|p| p.procedure_name == procedure)
        .map(|p| {
            column_type(&p.parameter_name, &p.type_name)
                .map(|column_type| ColumnInfo::new(p.parameter_name, column_type))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LoadDescriptor {
        mode: LoadMode::Procedure {
            name: procedure.to_string(),
            multi_partition,
        },
        columns,
        partition_count: 1,
    })
}

fn column_type(column: &str, type_name: &str) -> Result<ColumnType, SchemaError> {
    ColumnType::from_catalog_name(type_name).map_err(|_| SchemaError::UnsupportedColumnType {
        column: column.to_string(),
        type_name: type_name.to_string(),
    })
}

/// hosts × sites per host ÷ (k-factor + 1).
fn partition_count(deployment: &[DeploymentProperty]) -> Result<u32, SchemaError> {
    let property = |name: &str, default: u32| -> Result<u32, SchemaError> {
        match deployment
            .iter()
            .find(|p| p.property.eq_ignore_ascii_case(name))
        {
            Some(p) => p.value.trim().parse::<u32>().map_err(|_| {
                SchemaError::InvalidTopology(format!("{name} has non-numeric value '{}'", p.value))
            }),
            None => Ok(default),
        }
    };

    let hosts = property("hostcount", 1)?;
    let sites = property("sitesperhost", 1)?;
    let kfactor = property("kfactor", 0)?;

    let partitions = hosts
        .checked_mul(sites)
        .map(|n| n / (kfactor.saturating_add(1)))
        .ok_or_else(|| SchemaError::InvalidTopology("partition count overflows".to_string()))?;

    if partitions == 0 {
        return Err(SchemaError::InvalidTopology(format!(
            "{hosts} hosts with {sites} sites each cannot hold k-factor {kfactor}"
        )));
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{
        connectors::{
            catalog::{CatalogParameter, CatalogProcedure},
            memory::{MemoryCluster, MemoryProcedure, MemoryTable, Topology},
        },
        error::CatalogError,
    };

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("name", ColumnType::VarChar),
            ColumnInfo::new("id", ColumnType::BigInt),
        ]
    }

    fn cluster() -> MemoryCluster {
        MemoryCluster::builder()
            .with_table(MemoryTable::new("people", columns()).partitioned_on(1))
            .with_table(MemoryTable::new("towns", columns()))
            .with_procedure(MemoryProcedure::new("AddPerson", "people", columns(), true))
            .with_procedure(MemoryProcedure::new("AddTown", "towns", columns(), false))
            .with_topology(Topology {
                host_count: 2,
                sites_per_host: 3,
                kfactor: 1,
            })
            .build()
    }

    #[tokio::test]
    async fn resolves_partitioned_table() {
        let descriptor = resolve(&cluster(), &LoadTarget::Table("People".into()))
            .await
            .unwrap();

        assert_eq!(descriptor.partition_count, 3);
        assert_eq!(descriptor.column_count(), 2);
        assert_eq!(
            descriptor.mode,
            LoadMode::SinglePartitionTable {
                table: "PEOPLE".into(),
                partition_column: PartitionColumn {
                    index: 1,
                    column_type: ColumnType::BigInt,
                },
            }
        );
    }

    #[tokio::test]
    async fn unpartitioned_table_uses_one_worker() {
        let descriptor = resolve(&cluster(), &LoadTarget::Table("towns".into()))
            .await
            .unwrap();
        assert_eq!(descriptor.partition_count, 1);
        assert!(descriptor.mode.is_multi_partition());
    }

    #[tokio::test]
    async fn missing_table_and_procedure_are_errors() {
        let cluster = cluster();
        assert!(matches!(
            resolve(&cluster, &LoadTarget::Table("nope".into())).await,
            Err(SchemaError::SchemaNotFound(_))
        ));
        assert!(matches!(
            resolve(&cluster, &LoadTarget::Procedure("addperson".into())).await,
            Err(SchemaError::ProcedureNotFound(_))
        ));
    }

    #[tokio::test]
    async fn procedure_partitioning_comes_from_remarks() {
        let cluster = cluster();
        let single = resolve(&cluster, &LoadTarget::Procedure("AddPerson".into()))
            .await
            .unwrap();
        assert!(!single.mode.is_multi_partition());
        assert_eq!(single.partition_count, 1);
        assert_eq!(single.columns, columns());

        let multi = resolve(&cluster, &LoadTarget::Procedure("AddTown".into()))
            .await
            .unwrap();
        assert!(multi.mode.is_multi_partition());
    }

    struct BrokenCatalog {
        deployment: Vec<DeploymentProperty>,
        type_name: &'static str,
    }

    #[async_trait]
    impl Catalog for BrokenCatalog {
        async fn columns(&self) -> Result<Vec<CatalogColumn>, CatalogError> {
            Ok(vec![CatalogColumn {
                table_name: "T".into(),
                column_name: "K".into(),
                type_name: self.type_name.into(),
                ordinal_position: 1,
                remarks: Some("partition_column".into()),
            }])
        }

        async fn procedures(&self) -> Result<Vec<CatalogProcedure>, CatalogError> {
            Ok(Vec::new())
        }

        async fn procedure_columns(&self) -> Result<Vec<CatalogParameter>, CatalogError> {
            Ok(Vec::new())
        }

        async fn deployment(&self) -> Result<Vec<DeploymentProperty>, CatalogError> {
            Ok(self.deployment.clone())
        }
    }

    fn property(property: &str, value: &str) -> DeploymentProperty {
        DeploymentProperty {
            property: property.into(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn rejects_bad_topology() {
        let target = LoadTarget::Table("t".into());

        let malformed = BrokenCatalog {
            deployment: vec![property("HOSTCOUNT", "two")],
            type_name: "INTEGER",
        };
        assert!(matches!(
            resolve(&malformed, &target).await,
            Err(SchemaError::InvalidTopology(_))
        ));

        let empty = BrokenCatalog {
            deployment: vec![property("hostcount", "1"), property("kfactor", "1")],
            type_name: "INTEGER",
        };
        assert!(matches!(
            resolve(&empty, &target).await,
            Err(SchemaError::InvalidTopology(_))
        ));
    }

    #[tokio::test]
    async fn topology_defaults_to_one_partition() {
        let catalog = BrokenCatalog {
            deployment: Vec::new(),
            type_name: "INTEGER",
        };
        let descriptor = resolve(&catalog, &LoadTarget::Table("t".into()))
            .await
            .unwrap();
        assert_eq!(descriptor.partition_count, 1);
        assert!(!descriptor.mode.is_multi_partition());
    }

    #[tokio::test]
    async fn rejects_unknown_column_types() {
        let catalog = BrokenCatalog {
            deployment: Vec::new(),
            type_name: "GEOGRAPHY",
        };
        assert!(matches!(
            resolve(&catalog, &LoadTarget::Table("t".into())).await,
            Err(SchemaError::UnsupportedColumnType { .. })
        ));
    }
}
