pub mod barrier;
pub mod budget;
pub mod connectors;
pub mod error;
pub mod hashing;
pub mod metrics;
