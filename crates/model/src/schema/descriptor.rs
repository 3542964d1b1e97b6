use crate::schema::column::{ColumnInfo, PartitionColumn};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

/// System procedure loading a batch of rows into one partition.
pub const LOAD_SINGLE_PARTITION_TABLE: &str = "@LoadSinglepartitionTable";
/// System procedure loading a batch of rows into every partition.
pub const LOAD_MULTI_PARTITION_TABLE: &str = "@LoadMultipartitionTable";

/// What the user asked to load into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTarget {
    Table(String),
    Procedure(String),
}

impl LoadTarget {
    pub fn name(&self) -> &str {
        match self {
            LoadTarget::Table(name) | LoadTarget::Procedure(name) => name,
        }
    }

    pub fn uses_supplied_procedure(&self) -> bool {
        matches!(self, LoadTarget::Procedure(_))
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::Table(name) => write!(f, "table {name}"),
            LoadTarget::Procedure(name) => write!(f, "procedure {name}"),
        }
    }
}

/// How rows reach the cluster. Selected once by the schema resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadMode {
    /// Batches routed to the owning partition by the partition column.
    SinglePartitionTable {
        table: String,
        partition_column: PartitionColumn,
    },
    /// Batches fanned out by the cluster (replicated / unpartitioned table).
    MultiPartitionTable { table: String },
    /// One call per row to a user supplied procedure.
    Procedure { name: String, multi_partition: bool },
}

impl LoadMode {
    pub fn is_multi_partition(&self) -> bool {
        match self {
            LoadMode::SinglePartitionTable { .. } => false,
            LoadMode::MultiPartitionTable { .. } => true,
            LoadMode::Procedure {
                multi_partition, ..
            } => *multi_partition,
        }
    }

    /// Table loads go through batches and the failed-batch retry path.
    pub fn is_batched(&self) -> bool {
        !matches!(self, LoadMode::Procedure { .. })
    }

    pub fn target_name(&self) -> &str {
        match self {
            LoadMode::SinglePartitionTable { table, .. } | LoadMode::MultiPartitionTable { table } => {
                table
            }
            LoadMode::Procedure { name, .. } => name,
        }
    }

    pub fn partition_column(&self) -> Option<PartitionColumn> {
        match self {
            LoadMode::SinglePartitionTable {
                partition_column, ..
            } => Some(*partition_column),
            _ => None,
        }
    }
}

/// Everything the resolver learned about the target; read-only once workers
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDescriptor {
    pub mode: LoadMode,
    pub columns: Vec<ColumnInfo>,
    /// Number of partition workers to start.
    pub partition_count: u32,
}

impl LoadDescriptor {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Descriptor handed to the worker owning `partition_id`.
    pub fn for_partition(self: &Arc<Self>, partition_id: u32) -> PartitionDescriptor {
        PartitionDescriptor {
            partition_id,
            load: Arc::clone(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    pub partition_id: u32,
    pub load: Arc<LoadDescriptor>,
}

impl PartitionDescriptor {
    pub fn mode(&self) -> &LoadMode {
        &self.load.mode
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.load.columns
    }

    pub fn is_multi_partition(&self) -> bool {
        self.load.mode.is_multi_partition()
    }

    pub fn partition_column(&self) -> Option<PartitionColumn> {
        self.load.mode.partition_column()
    }

    pub fn target_name(&self) -> &str {
        self.load.mode.target_name()
    }
}
