//! Mock transport for testing.
//!
//! Provides an in-memory transport whose responses are scripted per
//! statement text, and which records what was done to it.

use super::{ColumnDescriptor, ResponseHandle, Session, Transport, TransportError};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scripted outcome for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    /// A result set with the given columns.
    Rows {
        columns: Vec<ColumnDescriptor>,
        row_count: usize,
    },
    /// No result set; the statement changed this many rows.
    Affected(u64),
    /// No result set although `field_count` columns were expected.
    Missing { field_count: usize, message: String },
    /// The server rejected the statement.
    Error(String),
}

impl MockResponse {
    pub fn rows(columns: Vec<ColumnDescriptor>, row_count: usize) -> Self {
        Self::Rows { columns, row_count }
    }
}

/// Counters shared between a mock transport and everything it hands out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockStats {
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub responses_released: usize,
    /// Every statement submitted, in order.
    pub submitted: Vec<String>,
    /// The streaming flag of every response fetch, in order.
    pub streaming_requests: Vec<bool>,
}

/// A transport that answers from a script instead of a server.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: HashMap<String, MockResponse>,
    rejected_dsns: HashSet<String>,
    stats: Arc<Mutex<MockStats>>,
}

impl MockTransport {
    /// Creates a mock transport with no scripted statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response for a statement.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into().trim().to_string(), response);
        self
    }

    /// Makes `connect` fail for the given data-source string.
    pub fn reject_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.rejected_dsns.insert(dsn.into());
        self
    }

    /// Returns a snapshot of the recorded activity.
    pub fn stats(&self) -> MockStats {
        lock(&self.stats).clone()
    }
}

impl Transport for MockTransport {
    fn connect(&self, dsn: &str) -> Result<Box<dyn Session>, TransportError> {
        if dsn.trim().is_empty() || self.rejected_dsns.contains(dsn) {
            return Err(TransportError::new(format!(
                "Unknown MySQL server host '{dsn}'"
            )));
        }

        lock(&self.stats).sessions_opened += 1;

        Ok(Box::new(MockSession {
            responses: self.responses.clone(),
            stats: Arc::clone(&self.stats),
            pending: None,
            last_error: String::new(),
        }))
    }
}

struct MockSession {
    responses: HashMap<String, MockResponse>,
    stats: Arc<Mutex<MockStats>>,
    pending: Option<MockResponse>,
    last_error: String,
}

impl Session for MockSession {
    fn submit_query(&mut self, sql: &str) -> Result<(), TransportError> {
        lock(&self.stats).submitted.push(sql.to_string());

        let response = self.responses.get(sql.trim()).cloned().unwrap_or_else(|| {
            MockResponse::Error(format!(
                "You have an error in your SQL syntax; check the manual that corresponds \
                 to your MySQL server version for the right syntax to use near '{sql}'"
            ))
        });

        if let MockResponse::Error(message) = response {
            self.pending = None;
            self.last_error = message.clone();
            return Err(TransportError::new(message));
        }

        if let MockResponse::Missing { message, .. } = &response {
            self.last_error = message.clone();
        } else {
            self.last_error.clear();
        }
        self.pending = Some(response);
        Ok(())
    }

    fn field_count(&self) -> usize {
        match &self.pending {
            Some(MockResponse::Rows { columns, .. }) => columns.len(),
            Some(MockResponse::Missing { field_count, .. }) => *field_count,
            _ => 0,
        }
    }

    fn fetch_response(&mut self, streaming: bool) -> Option<Box<dyn ResponseHandle>> {
        lock(&self.stats).streaming_requests.push(streaming);

        match &self.pending {
            Some(MockResponse::Rows { columns, row_count }) => Some(Box::new(MockHandle {
                columns: columns.clone(),
                row_count: *row_count,
                streaming,
                stats: Arc::clone(&self.stats),
            })),
            _ => None,
        }
    }

    fn affected_rows(&self) -> u64 {
        match &self.pending {
            Some(MockResponse::Affected(count)) => *count,
            _ => 0,
        }
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn close(self: Box<Self>) {
        lock(&self.stats).sessions_closed += 1;
    }
}

/// Result set handed out by the mock transport.
#[derive(Debug)]
pub struct MockHandle {
    columns: Vec<ColumnDescriptor>,
    row_count: usize,
    streaming: bool,
    stats: Arc<Mutex<MockStats>>,
}

impl MockHandle {
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

impl ResponseHandle for MockHandle {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn column_descriptor(&self, index: usize) -> Option<ColumnDescriptor> {
        self.columns.get(index).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        lock(&self.stats).responses_released += 1;
    }
}

fn lock(stats: &Mutex<MockStats>) -> MutexGuard<'_, MockStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
