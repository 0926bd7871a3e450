//! Query echo: optionally writes every submitted statement to a sink.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Where echoed statements are written.
#[derive(Clone, Default)]
pub enum DiagnosticSink {
    #[default]
    Stdout,
    Stderr,
    /// A caller-provided writer, shared so the caller can inspect it.
    Writer(Arc<Mutex<dyn Write + Send>>),
}

impl DiagnosticSink {
    /// Wraps a writer as a sink.
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Self::Writer(Arc::new(Mutex::new(writer)))
    }

    fn write_line(&self, line: &str) -> std::io::Result<()> {
        match self {
            Self::Stdout => writeln!(std::io::stdout().lock(), "{line}"),
            Self::Stderr => writeln!(std::io::stderr().lock(), "{line}"),
            Self::Writer(writer) => {
                let mut writer = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                writeln!(writer, "{line}")?;
                writer.flush()
            }
        }
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("Stdout"),
            Self::Stderr => f.write_str("Stderr"),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Per-connection switch that echoes statements before they are submitted.
#[derive(Debug, Default)]
pub(crate) struct QueryEcho {
    enabled: AtomicBool,
    sink: DiagnosticSink,
}

impl QueryEcho {
    pub(crate) fn new(enabled: bool, sink: DiagnosticSink) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            sink,
        }
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Writes `sql` to the sink if echoing is on. Write failures are logged
    /// and otherwise ignored.
    pub(crate) fn print(&self, sql: &str) {
        if !self.is_enabled() {
            return;
        }
        if let Err(e) = self.sink.write_line(sql) {
            warn!("Failed to echo query: {}", e);
        }
    }
}
