//! Connection lifecycle and query submission.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::echo::{DiagnosticSink, QueryEcho};
use crate::db::{IndexInfo, ResponseHandle, Session, Transport};
use crate::error::{ConduitError, Result};
use crate::query::{QueryResult, ResultStreaming, TabularResult, TypeTranslator};

/// Options fixed when a connection is opened.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Echo every submitted statement to `sink`.
    pub print_queries: bool,
    pub sink: DiagnosticSink,
}

impl ConnectionOptions {
    pub fn with_print_queries(mut self, print_queries: bool) -> Self {
        self.print_queries = print_queries;
        self
    }

    pub fn with_sink(mut self, sink: DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }
}

/// A single session with a remote server.
///
/// A connection is either open, owning a live session, or closed. Queries
/// may be issued from several threads; submission and retrieval of the
/// response are serialized by an internal lock. Reading rows from a returned
/// result is not, so a streaming result must be drained or dropped before the
/// next statement is issued.
#[derive(Default)]
pub struct Connection {
    session: Mutex<Option<Box<dyn Session>>>,
    dsn: String,
    echo: QueryEcho,
}

/// What the server sent back for one statement.
enum Response {
    Rows {
        handle: Box<dyn ResponseHandle>,
        field_count: usize,
    },
    Affected(u64),
}

impl Connection {
    /// Opens a connection with default options.
    pub fn open(transport: &dyn Transport, dsn: &str) -> Result<Self> {
        Self::open_with_options(transport, dsn, ConnectionOptions::default())
    }

    /// Opens a connection using the given data-source string.
    pub fn open_with_options(
        transport: &dyn Transport,
        dsn: &str,
        options: ConnectionOptions,
    ) -> Result<Self> {
        debug!("Opening session");
        let session = transport
            .connect(dsn)
            .map_err(|e| ConduitError::connection(format!("Failed to connect: {e}")))?;

        Ok(Self {
            session: Mutex::new(Some(session)),
            dsn: dsn.to_string(),
            echo: QueryEcho::new(options.print_queries, options.sink),
        })
    }

    /// The data-source string the connection was opened with.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    /// Runs a statement without resolving column types.
    ///
    /// Result sets come back with an empty field list; callers translate
    /// lazily from the handle's own metadata.
    pub fn query(&self, sql: &str, streaming: ResultStreaming) -> Result<QueryResult> {
        self.query_internal(sql, streaming, None)
    }

    /// Runs a statement and translates the columns of its result set.
    pub fn query_with_types(
        &self,
        sql: &str,
        streaming: ResultStreaming,
        translator: &dyn TypeTranslator,
    ) -> Result<QueryResult> {
        self.query_internal(sql, streaming, Some(translator))
    }

    /// Runs a statement for its side effects only.
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.query_internal(sql, ResultStreaming::ForceMaterialization, None)
            .map(|_| ())
    }

    pub fn is_open(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Ends the session. Does nothing if the connection is already closed.
    pub fn close(&self) {
        let session = self.lock_session().take();
        if let Some(session) = session {
            debug!("Closing session");
            session.close();
        }
    }

    /// Index metadata for a table. Not implemented yet; always empty.
    pub fn get_index_info(&self, _table_name: &str) -> Vec<IndexInfo> {
        Vec::new()
    }

    /// Turns statement echoing on or off.
    pub fn set_print_queries(&self, print_queries: bool) {
        self.echo.set_enabled(print_queries);
    }

    pub fn print_queries(&self) -> bool {
        self.echo.is_enabled()
    }

    /// Moves the session into a new connection, leaving this one closed.
    pub fn take(&mut self) -> Connection {
        std::mem::take(self)
    }

    fn query_internal(
        &self,
        sql: &str,
        streaming: ResultStreaming,
        translator: Option<&dyn TypeTranslator>,
    ) -> Result<QueryResult> {
        self.echo.print(sql);

        let allow_streaming = streaming.allows_streaming();
        let response = self.submit(sql, allow_streaming)?;

        match response {
            Response::Affected(count) => Ok(QueryResult::AffectedRows(count)),
            Response::Rows {
                handle,
                field_count,
            } => {
                let result = match translator {
                    Some(translator) => {
                        TabularResult::with_fields(handle, field_count, allow_streaming, translator)?
                    }
                    None => TabularResult::new(handle, field_count, allow_streaming),
                };
                Ok(QueryResult::Rows(result))
            }
        }
    }

    /// Submits a statement and classifies the response while holding the
    /// session lock.
    fn submit(&self, sql: &str, streaming: bool) -> Result<Response> {
        let mut guard = self.lock_session();
        let session = guard.as_mut().ok_or_else(|| {
            ConduitError::connection(format!(
                "Failed to run query \"{sql}\": connection is closed"
            ))
        })?;

        debug!("Submitting query (streaming: {})", streaming);
        session.submit_query(sql).map_err(|e| {
            ConduitError::connection(format!("Failed to run query \"{sql}\": {e}"))
        })?;

        let handle = session.fetch_response(streaming);
        let field_count = session.field_count();

        match handle {
            Some(handle) => Ok(Response::Rows {
                handle,
                field_count,
            }),
            // No result set by design (DDL, DML).
            None if field_count == 0 => Ok(Response::Affected(session.affected_rows())),
            // A result set was expected but the transport produced none.
            None => Err(ConduitError::connection(format!(
                "Failed to fetch result for query \"{sql}\": {}",
                session.last_error()
            ))),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Box<dyn Session>>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("print_queries", &self.print_queries())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
