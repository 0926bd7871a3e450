//! Connection management for db-conduit.
//!
//! Owns the session with the remote server and mediates all query traffic
//! through it.

mod echo;
pub mod manager;

pub use echo::DiagnosticSink;
pub use manager::{Connection, ConnectionOptions};
