pub mod error;
pub mod execution;
pub mod router;
pub mod schema;
