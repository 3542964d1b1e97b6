pub mod convert;
pub mod error;
pub mod invocation;
pub mod processor;
