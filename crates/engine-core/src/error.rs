use thiserror::Error;

/// Failures of the client connection itself, as opposed to a call the
/// cluster answered with an error status.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("No connections available to the cluster")]
    NoConnections,

    #[error("Client is shut down")]
    Closed,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog query failed: {0}")]
    Query(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
