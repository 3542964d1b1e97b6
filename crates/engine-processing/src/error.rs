use engine_core::error::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to submit call for partition {partition}: {source}")]
    Submit {
        partition: u32,
        #[source]
        source: TransportError,
    },

    #[error("Failed to drain the client for partition {partition}: {source}")]
    Drain {
        partition: u32,
        #[source]
        source: TransportError,
    },
}
