pub mod callback;
pub mod config;
pub mod context;
pub mod failure;
pub mod partition;
pub mod state;
