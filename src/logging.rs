//! Logging configuration for db-conduit.
//!
//! Logs go to stderr so that they never mix with query output or echoed
//! statements on stdout.

use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the log filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to stderr.
///
/// `verbose` lowers the default level to `debug`.
pub fn init_stderr_logging(verbose: bool) {
    let default = if verbose { "debug" } else { DEFAULT_FILTER };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .init();
}
