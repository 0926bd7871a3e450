//! Configuration management for db-conduit.
//!
//! Handles loading configuration from TOML files and environment variables.

use crate::error::{ConduitError, Result};
use crate::query::ResultStreaming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable consulted when no data-source string is configured.
pub const DSN_ENV_VAR: &str = "DATABASE_URL";

/// Main configuration structure for db-conduit.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub types: TypeOptions,
}

/// Connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConnectionConfig {
    /// Data-source string handed to the transport unchanged.
    pub dsn: Option<String>,

    /// Echo every submitted statement to stdout.
    #[serde(default)]
    pub print_queries: bool,

    /// Let result sets stream from the server instead of buffering them.
    #[serde(default)]
    pub streaming: bool,
}

impl ConnectionConfig {
    /// Fills a missing data-source string from `DATABASE_URL`.
    pub fn apply_env_defaults(&mut self) {
        if self.dsn.is_none() {
            self.dsn = std::env::var(DSN_ENV_VAR).ok();
        }
    }

    /// Returns the configured data-source string.
    pub fn require_dsn(&self) -> Result<&str> {
        self.dsn.as_deref().filter(|dsn| !dsn.is_empty()).ok_or_else(|| {
            ConduitError::config(format!(
                "No data source configured. Pass --dsn, set [connection] dsn, or set {DSN_ENV_VAR}"
            ))
        })
    }

    pub fn streaming_preference(&self) -> ResultStreaming {
        if self.streaming {
            ResultStreaming::AllowStreaming
        } else {
            ResultStreaming::ForceMaterialization
        }
    }
}

/// Options for translating MySQL column types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeOptions {
    /// Treat `TINYINT(1)` columns as BOOLEAN.
    #[serde(default = "default_true")]
    pub tinyint1_as_boolean: bool,

    /// Treat `BIT(1)` columns as BOOLEAN.
    #[serde(default = "default_true")]
    pub bit1_as_boolean: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            tinyint1_as_boolean: true,
            bit1_as_boolean: true,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-conduit")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConduitError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConduitError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
