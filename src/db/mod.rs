//! Transport layer for db-conduit.
//!
//! The transport is the database client library underneath a `Connection`.
//! It is modelled as a synchronous RPC interface so that different backends
//! (the `mysql_async` driver, the in-memory mock) can be used interchangeably.

mod mock;
mod mysql;
mod schema;
mod types;

pub use mock::{MockHandle, MockResponse, MockStats, MockTransport};
pub use mysql::{MySqlResponse, MySqlTransport};
pub use schema::IndexInfo;
pub use types::{ColumnDescriptor, ColumnFlags, LogicalType, ServerType};

use std::any::Any;
use thiserror::Error;

/// A failure reported by the transport, carrying its native diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Establishes sessions with a database server.
pub trait Transport: Send + Sync {
    /// Opens a new session using the given data-source string.
    fn connect(&self, dsn: &str) -> Result<Box<dyn Session>, TransportError>;
}

/// One live session with a database server.
///
/// A session services a single in-flight statement at a time. After
/// `submit_query` succeeds, `fetch_response`, `field_count` and
/// `affected_rows` describe that statement until the next submission.
pub trait Session: Send {
    /// Sends the statement text to the server and waits for it to complete.
    fn submit_query(&mut self, sql: &str) -> Result<(), TransportError>;

    /// Number of columns the last statement's result should have, whether or
    /// not a result set was produced.
    fn field_count(&self) -> usize;

    /// Takes the result set of the last statement, or `None` if it produced
    /// none. With `streaming` the rows may be pulled lazily from the server.
    fn fetch_response(&mut self, streaming: bool) -> Option<Box<dyn ResponseHandle>>;

    /// Rows changed by the last statement.
    fn affected_rows(&self) -> u64;

    /// Diagnostic message for the most recent failure.
    fn last_error(&self) -> String;

    /// Ends the session.
    fn close(self: Box<Self>);
}

/// A result set produced by a session.
///
/// The handle is returned to the transport when it is dropped.
pub trait ResponseHandle: Send {
    /// Number of columns in the result set.
    fn field_count(&self) -> usize;

    /// Metadata for the column at `index`, or `None` if out of range.
    fn column_descriptor(&self, index: usize) -> Option<ColumnDescriptor>;

    /// Access to the concrete handle for row readers built on a specific
    /// transport.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
