use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use model::core::value::Value;
use serde::Serialize;
use std::fmt;

/// Arguments of a cluster call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Payload {
    /// Rows for one of the table-load system procedures.
    Table { table: String, rows: Vec<Vec<Value>> },
    /// Positional parameters of a user procedure.
    Params(Vec<Value>),
}

impl Payload {
    pub fn row_count(&self) -> usize {
        match self {
            Payload::Table { rows, .. } => rows.len(),
            Payload::Params(_) => 1,
        }
    }
}

/// A fully-built call: what to run, where to route it, and with which data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub procedure: String,
    /// Present for single-partition calls.
    #[serde(skip)]
    pub routing_key: Option<Bytes>,
    pub payload: Payload,
}

impl Invocation {
    pub fn is_single_partition(&self) -> bool {
        self.routing_key.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    Success,
    /// The procedure ran and refused the data (constraint, bad value).
    UserAbort,
    /// The routing key does not own the rows.
    Mispartitioned,
    /// The call was accepted but the connection dropped before an answer.
    ConnectionLost,
    UnexpectedFailure,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Success => write!(f, "SUCCESS"),
            CallStatus::UserAbort => write!(f, "USER_ABORT"),
            CallStatus::Mispartitioned => write!(f, "MISPARTITIONED"),
            CallStatus::ConnectionLost => write!(f, "CONNECTION_LOST"),
            CallStatus::UnexpectedFailure => write!(f, "UNEXPECTED_FAILURE"),
        }
    }
}

/// The cluster's answer to one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    pub status: CallStatus,
    pub status_string: String,
    /// Rows the call modified; zero unless successful.
    pub rows_affected: u64,
}

impl CallResponse {
    pub fn success(rows_affected: u64) -> Self {
        Self {
            status: CallStatus::Success,
            status_string: String::new(),
            rows_affected,
        }
    }

    pub fn failure(status: CallStatus, status_string: impl Into<String>) -> Self {
        Self {
            status,
            status_string: status_string.into(),
            rows_affected: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CallStatus::Success
    }
}

/// Completion handler of an asynchronous call.
///
/// Invoked at most once, on a task owned by the client, concurrently with
/// the submitting worker and with other callbacks.
pub trait ProcedureCallback: Send + 'static {
    fn on_complete(self: Box<Self>, response: CallResponse);
}

/// Asynchronous procedure-call client shared by every worker.
#[async_trait]
pub trait LoadClient: Send + Sync {
    /// Queues a call and returns once the client accepted it. May wait for
    /// the client's outbound window, but never for the answer.
    async fn submit(
        &self,
        invocation: Invocation,
        callback: Box<dyn ProcedureCallback>,
    ) -> Result<(), TransportError>;

    /// Waits until every accepted call has run its callback.
    async fn drain(&self) -> Result<(), TransportError>;
}
