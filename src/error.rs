//! Error types for db-conduit.
//!
//! Defines the main error enum used throughout the crate.

use thiserror::Error;

/// Main error type for db-conduit operations.
#[derive(Error, Debug)]
pub enum ConduitError {
    /// Transport failures: opening a session, submitting a query, or fetching
    /// an expected result set.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A remote column type could not be translated into a logical type.
    #[error("Type error: {0}")]
    Type(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConduitError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a type translation error with the given message.
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Type(_) => "Type Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true for the I/O class of failures raised by the transport.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type alias using ConduitError.
pub type Result<T> = std::result::Result<T, ConduitError>;
