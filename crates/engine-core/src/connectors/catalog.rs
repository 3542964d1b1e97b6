use crate::error::CatalogError;
use async_trait::async_trait;

/// One entry of the `COLUMNS` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub table_name: String,
    pub column_name: String,
    pub type_name: String,
    /// 1-based.
    pub ordinal_position: u32,
    pub remarks: Option<String>,
}

/// One entry of the `PROCEDURES` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProcedure {
    pub procedure_name: String,
    pub remarks: Option<String>,
}

/// One entry of the `PROCEDURECOLUMNS` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogParameter {
    pub procedure_name: String,
    pub parameter_name: String,
    pub type_name: String,
}

/// One `(property, value)` pair of the deployment listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentProperty {
    pub property: String,
    pub value: String,
}

/// Read-only view of the cluster's system catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn columns(&self) -> Result<Vec<CatalogColumn>, CatalogError>;
    async fn procedures(&self) -> Result<Vec<CatalogProcedure>, CatalogError>;
    async fn procedure_columns(&self) -> Result<Vec<CatalogParameter>, CatalogError>;
    async fn deployment(&self) -> Result<Vec<DeploymentProperty>, CatalogError>;
}
