//! db-conduit - Query execution and result marshalling for remote MySQL servers.
//!
//! A `Connection` owns one session with the server, submits statements through
//! a `Transport`, and hands back either an affected-row count or a result set
//! whose columns have been translated into host logical types.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;

pub use connection::{Connection, ConnectionOptions, DiagnosticSink};
pub use error::{ConduitError, Result};
pub use query::{FieldDescriptor, QueryResult, ResultStreaming, TabularResult, TypeTranslator};
