use crate::{
    connectors::{
        catalog::{Catalog, CatalogColumn, CatalogParameter, CatalogProcedure, DeploymentProperty},
        client::{CallResponse, CallStatus, Invocation, LoadClient, Payload, ProcedureCallback},
    },
    error::{CatalogError, TransportError},
    hashing::Hashinator,
};
use async_trait::async_trait;
use bytes::Bytes;
use model::{
    core::value::Value,
    schema::{
        column::ColumnInfo,
        descriptor::{LOAD_MULTI_PARTITION_TABLE, LOAD_SINGLE_PARTITION_TABLE},
    },
};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, warn};

/// Server-side row check: `(table, row) -> Err(reason)` rejects the row.
pub type RowValidator = Arc<dyn Fn(&str, &[Value]) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub partition_column: Option<usize>,
}

impl MemoryTable {
    /// A replicated (unpartitioned) table.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            partition_column: None,
        }
    }

    pub fn partitioned_on(mut self, index: usize) -> Self {
        self.partition_column = Some(index);
        self
    }
}

/// A user procedure that inserts its parameters as one row of `table`.
#[derive(Debug, Clone)]
pub struct MemoryProcedure {
    pub name: String,
    pub parameters: Vec<ColumnInfo>,
    pub table: String,
    pub single_partition: bool,
}

impl MemoryProcedure {
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        parameters: Vec<ColumnInfo>,
        single_partition: bool,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            table: table.into(),
            single_partition,
        }
    }

    fn remarks(&self) -> String {
        serde_json::json!({ "singlePartition": self.single_partition }).to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub host_count: u32,
    pub sites_per_host: u32,
    pub kfactor: u32,
}

impl Topology {
    pub fn partition_count(&self) -> u32 {
        self.host_count * self.sites_per_host / (self.kfactor + 1)
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            host_count: 1,
            sites_per_host: 4,
            kfactor: 0,
        }
    }
}

pub struct MemoryClusterBuilder {
    tables: Vec<MemoryTable>,
    procedures: Vec<MemoryProcedure>,
    topology: Topology,
    validator: Option<RowValidator>,
    latency: Duration,
    window: usize,
    disconnect_after: Option<u64>,
}

impl Default for MemoryClusterBuilder {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            procedures: Vec::new(),
            topology: Topology::default(),
            validator: None,
            latency: Duration::ZERO,
            window: 1000,
            disconnect_after: None,
        }
    }
}

impl MemoryClusterBuilder {
    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_procedure(mut self, procedure: MemoryProcedure) -> Self {
        self.procedures.push(procedure);
        self
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Delay before each call is answered, so callbacks overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Maximum number of calls awaiting an answer.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Drops the connection once `calls` calls have been answered.
    pub fn with_disconnect_after(mut self, calls: u64) -> Self {
        self.disconnect_after = Some(calls);
        self
    }

    pub fn build(self) -> MemoryCluster {
        let tables = self
            .tables
            .into_iter()
            .map(|t| (t.name.to_uppercase(), t))
            .collect();
        let procedures = self
            .procedures
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        MemoryCluster {
            inner: Arc::new(ClusterInner {
                tables,
                procedures,
                topology: self.topology,
                hashinator: Hashinator::new(self.topology.partition_count()),
                validator: self.validator,
                latency: self.latency,
                disconnect_after: self.disconnect_after,
                window: Arc::new(Semaphore::new(self.window)),
                connected: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                answered: AtomicU64::new(0),
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
                storage: Mutex::new(HashMap::new()),
                submissions: Mutex::new(Vec::new()),
            }),
        }
    }
}

struct ClusterInner {
    tables: HashMap<String, MemoryTable>,
    procedures: HashMap<String, MemoryProcedure>,
    topology: Topology,
    hashinator: Hashinator,
    validator: Option<RowValidator>,
    latency: Duration,
    disconnect_after: Option<u64>,
    window: Arc<Semaphore>,
    connected: AtomicBool,
    closed: AtomicBool,
    answered: AtomicU64,
    outstanding: AtomicUsize,
    idle: Notify,
    storage: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    submissions: Mutex<Vec<Invocation>>,
}

/// In-process cluster used for local runs and tests.
///
/// Table loads are atomic per call: one rejected row rejects the whole call
/// and nothing is stored. Callbacks run on spawned tasks.
#[derive(Clone)]
pub struct MemoryCluster {
    inner: Arc<ClusterInner>,
}

impl MemoryCluster {
    pub fn builder() -> MemoryClusterBuilder {
        MemoryClusterBuilder::default()
    }

    pub fn hashinator(&self) -> Hashinator {
        self.inner.hashinator
    }

    pub fn partition_count(&self) -> u32 {
        self.inner.hashinator.partition_count()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Shuts the client down; later submissions and drains fail.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.disconnect();
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Rows stored in `table`, in the order calls were applied.
    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        lock(&self.inner.storage)
            .get(&table.to_uppercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        lock(&self.inner.storage)
            .get(&table.to_uppercase())
            .map_or(0, Vec::len)
    }

    /// Every accepted call in submission order.
    pub fn submissions(&self) -> Vec<Invocation> {
        lock(&self.inner.submissions).clone()
    }

    fn disconnect(&self) {
        if self.inner.connected.swap(false, Ordering::AcqRel) {
            warn!("Connection to cluster lost");
        }
    }

    fn connection_lost() -> TransportError {
        TransportError::ConnectionLost("Connection to database host was lost".to_string())
    }

    fn finish_call(&self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }

    fn execute(&self, invocation: &Invocation) -> CallResponse {
        if !self.is_connected() {
            return CallResponse::failure(
                CallStatus::ConnectionLost,
                "Connection to database host was lost before a response was received",
            );
        }

        if let Some(limit) = self.inner.disconnect_after {
            let admitted = self
                .inner
                .answered
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < limit).then_some(n + 1)
                });
            if admitted.is_err() {
                self.disconnect();
                return CallResponse::failure(
                    CallStatus::ConnectionLost,
                    "Connection to database host was lost before a response was received",
                );
            }
        }

        match &invocation.payload {
            Payload::Table { table, rows } => self.load_table(
                &invocation.procedure,
                invocation.routing_key.as_ref(),
                table,
                rows,
            ),
            Payload::Params(params) => self.call_procedure(&invocation.procedure, params),
        }
    }

    fn load_table(
        &self,
        procedure: &str,
        routing_key: Option<&Bytes>,
        table_name: &str,
        rows: &[Vec<Value>],
    ) -> CallResponse {
        let Some(table) = self.inner.tables.get(&table_name.to_uppercase()) else {
            return CallResponse::failure(
                CallStatus::UnexpectedFailure,
                format!("Table {table_name} not present in the catalog"),
            );
        };

        match procedure {
            LOAD_SINGLE_PARTITION_TABLE => {
                let (Some(key), Some(index)) = (routing_key, table.partition_column) else {
                    return CallResponse::failure(
                        CallStatus::UnexpectedFailure,
                        format!("Table {table_name} cannot be loaded one partition at a time"),
                    );
                };
                let hashinator = self.inner.hashinator;
                let target = hashinator.partition_for(key);
                let column_type = table.columns[index].column_type;
                let misrouted = rows.iter().any(|row| {
                    row.get(index)
                        .is_none_or(|v| hashinator.partition_for_value(v, column_type) != target)
                });
                if misrouted {
                    return CallResponse::failure(
                        CallStatus::Mispartitioned,
                        "Mispartitioned tuple in single-partition insert statement",
                    );
                }
            }
            LOAD_MULTI_PARTITION_TABLE => {}
            other => {
                return CallResponse::failure(
                    CallStatus::UnexpectedFailure,
                    format!("Procedure {other} was not found"),
                );
            }
        }

        for row in rows {
            if let Err(response) = self.check_row(table, row) {
                return response;
            }
        }

        lock(&self.inner.storage)
            .entry(table.name.to_uppercase())
            .or_default()
            .extend(rows.iter().cloned());

        debug!(table = %table.name, rows = rows.len(), "Loaded rows");
        CallResponse::success(rows.len() as u64)
    }

    fn call_procedure(&self, name: &str, params: &[Value]) -> CallResponse {
        let Some(procedure) = self.inner.procedures.get(name) else {
            return CallResponse::failure(
                CallStatus::UnexpectedFailure,
                format!("Procedure {name} was not found"),
            );
        };
        if params.len() != procedure.parameters.len() {
            return CallResponse::failure(
                CallStatus::UnexpectedFailure,
                format!(
                    "Procedure {name} expects {} parameters but received {}",
                    procedure.parameters.len(),
                    params.len()
                ),
            );
        }
        let Some(table) = self.inner.tables.get(&procedure.table.to_uppercase()) else {
            return CallResponse::failure(
                CallStatus::UnexpectedFailure,
                format!("Table {} not present in the catalog", procedure.table),
            );
        };
        if let Err(response) = self.check_row(table, params) {
            return response;
        }

        lock(&self.inner.storage)
            .entry(table.name.to_uppercase())
            .or_default()
            .push(params.to_vec());
        CallResponse::success(1)
    }

    fn check_row(&self, table: &MemoryTable, row: &[Value]) -> Result<(), CallResponse> {
        if row.len() != table.columns.len() {
            return Err(CallResponse::failure(
                CallStatus::UnexpectedFailure,
                format!(
                    "Table {} has {} columns but the row has {}",
                    table.name,
                    table.columns.len(),
                    row.len()
                ),
            ));
        }
        if let Some(validator) = &self.inner.validator {
            validator(&table.name, row).map_err(|reason| {
                CallResponse::failure(
                    CallStatus::UserAbort,
                    format!("Constraint violation in {}: {reason}", table.name),
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl LoadClient for MemoryCluster {
    async fn submit(
        &self,
        invocation: Invocation,
        callback: Box<dyn ProcedureCallback>,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(Self::connection_lost());
        }

        let permit = Arc::clone(&self.inner.window)
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;

        if !self.is_connected() {
            return Err(Self::connection_lost());
        }

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        lock(&self.inner.submissions).push(invocation.clone());

        let cluster = self.clone();
        tokio::spawn(async move {
            if !cluster.inner.latency.is_zero() {
                tokio::time::sleep(cluster.inner.latency).await;
            }
            let response = cluster.execute(&invocation);
            drop(permit);
            callback.on_complete(response);
            cluster.finish_call();
        });

        Ok(())
    }

    async fn drain(&self) -> Result<(), TransportError> {
        loop {
            let idle = self.inner.idle.notified();
            if self.outstanding() == 0 {
                break;
            }
            idle.await;
        }

        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::NoConnections);
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for MemoryCluster {
    async fn columns(&self) -> Result<Vec<CatalogColumn>, CatalogError> {
        let mut columns = Vec::new();
        for table in self.inner.tables.values() {
            for (i, column) in table.columns.iter().enumerate() {
                columns.push(CatalogColumn {
                    table_name: table.name.to_uppercase(),
                    column_name: column.name.to_uppercase(),
                    type_name: column.column_type.catalog_name().to_string(),
                    ordinal_position: i as u32 + 1,
                    remarks: (table.partition_column == Some(i))
                        .then(|| "PARTITION_COLUMN".to_string()),
                });
            }
        }
        Ok(columns)
    }

    async fn procedures(&self) -> Result<Vec<CatalogProcedure>, CatalogError> {
        Ok(self
            .inner
            .procedures
            .values()
            .map(|p| CatalogProcedure {
                procedure_name: p.name.clone(),
                remarks: Some(p.remarks()),
            })
            .collect())
    }

    async fn procedure_columns(&self) -> Result<Vec<CatalogParameter>, CatalogError> {
        Ok(self
            .inner
            .procedures
            .values()
            .flat_map(|p| {
                p.parameters.iter().map(|param| CatalogParameter {
                    procedure_name: p.name.clone(),
                    parameter_name: param.name.clone(),
                    type_name: param.column_type.catalog_name().to_string(),
                })
            })
            .collect())
    }

    async fn deployment(&self) -> Result<Vec<DeploymentProperty>, CatalogError> {
        let topology = self.inner.topology;
        Ok([
            ("hostcount", topology.host_count),
            ("sitesperhost", topology.sites_per_host),
            ("kfactor", topology.kfactor),
        ]
        .into_iter()
        .map(|(property, value)| DeploymentProperty {
            property: property.to_string(),
            value: value.to_string(),
        })
        .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
