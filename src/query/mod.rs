//! Result marshalling for db-conduit.
//!
//! Turns the transport's raw response into a caller-facing result, translating
//! column metadata into host types when a translator is supplied.

pub mod result;
pub mod translate;

pub use result::{FieldDescriptor, QueryResult, ResultStreaming, TabularResult};
pub use translate::{MySqlTypeTranslator, TypeTranslator};
