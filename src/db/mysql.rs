//! MySQL transport implementation.
//!
//! Provides `MySqlTransport`, which implements the `Transport` trait on top of
//! the `mysql_async` driver. Each session's connection is owned by a worker
//! task on the transport's runtime; the blocking `Session` calls send it a
//! command and wait for the reply. Because the worker keeps a statement's
//! result open between commands, a streaming response can pull rows from the
//! server one at a time instead of buffering them up front.

use crate::db::{
    ColumnDescriptor, ColumnFlags, ResponseHandle, ServerType, Session, Transport, TransportError,
};
use crate::error::{ConduitError, Result};
use mysql_async::consts::{ColumnFlags as WireFlags, ColumnType};
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Opts, QueryResult, Row, TextProtocol};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Character set number MySQL reports for binary strings.
const BINARY_CHARSET: u16 = 63;

/// Client error 2014, reported when a statement is sent while an unread
/// result set is still pending.
const COMMANDS_OUT_OF_SYNC: &str =
    "ERROR 2014 (HY000): Commands out of sync; you can't run this command now";

/// Transport backed by the `mysql_async` driver.
#[derive(Debug, Clone)]
pub struct MySqlTransport {
    runtime: Arc<Runtime>,
}

impl MySqlTransport {
    /// Creates a transport with its own runtime for connection workers.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("db-conduit-mysql")
            .enable_all()
            .build()
            .map_err(|e| ConduitError::internal(format!("Failed to start runtime: {e}")))?;

        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

impl Transport for MySqlTransport {
    fn connect(&self, dsn: &str) -> std::result::Result<Box<dyn Session>, TransportError> {
        let opts = Opts::from_url(dsn)
            .map_err(|e| TransportError::new(format!("Invalid connection string: {e}")))?;

        let conn = self
            .runtime
            .block_on(Conn::new(opts))
            .map_err(|e| map_connection_error(&e))?;

        debug!("Successfully connected to database");

        let (commands, receiver) = mpsc::unbounded_channel();
        self.runtime.spawn(serve(conn, receiver));

        Ok(Box::new(MySqlSession {
            _runtime: Arc::clone(&self.runtime),
            commands,
            statement: 0,
            outcome: None,
            last_error: String::new(),
        }))
    }
}

type Reply<T> = oneshot::Sender<std::result::Result<T, TransportError>>;

/// Requests a session sends to its connection worker.
enum Command {
    /// Run a statement and report its result-set header.
    Query {
        statement: u64,
        sql: String,
        reply: Reply<Outcome>,
    },
    /// Read every remaining row of the statement's result set.
    Store { statement: u64, reply: Reply<Vec<Row>> },
    /// Read one row of the statement's result set.
    NextRow {
        statement: u64,
        reply: Reply<Option<Row>>,
    },
    /// Discard whatever is left of the statement's result set.
    Release { statement: u64 },
    /// Disconnect and stop the worker.
    Close { reply: oneshot::Sender<()> },
}

/// What the server said about a statement before any row was read.
#[derive(Debug, Clone, Default)]
struct Outcome {
    columns: Vec<ColumnDescriptor>,
    affected_rows: u64,
}

struct MySqlSession {
    // Keeps the worker's runtime alive for as long as the session exists.
    _runtime: Arc<Runtime>,
    commands: mpsc::UnboundedSender<Command>,
    statement: u64,
    outcome: Option<Outcome>,
    last_error: String,
}

impl MySqlSession {
    fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> std::result::Result<T, TransportError> {
        request(&self.commands, command)
    }
}

impl Session for MySqlSession {
    fn submit_query(&mut self, sql: &str) -> std::result::Result<(), TransportError> {
        self.outcome = None;
        self.statement += 1;

        let statement = self.statement;
        let sql = sql.to_string();
        match self.request(|reply| Command::Query {
            statement,
            sql,
            reply,
        }) {
            Ok(outcome) => {
                self.last_error.clear();
                self.outcome = Some(outcome);
                Ok(())
            }
            Err(e) => {
                self.last_error = e.message.clone();
                Err(e)
            }
        }
    }

    fn field_count(&self) -> usize {
        self.outcome.as_ref().map_or(0, |o| o.columns.len())
    }

    fn fetch_response(&mut self, streaming: bool) -> Option<Box<dyn ResponseHandle>> {
        let columns = self.outcome.as_ref()?.columns.clone();
        if columns.is_empty() {
            return None;
        }

        let statement = self.statement;
        if streaming {
            return Some(Box::new(MySqlResponse {
                columns,
                rows: Rows::Streaming {
                    statement,
                    commands: self.commands.clone(),
                    finished: false,
                },
            }));
        }

        match self.request(|reply| Command::Store { statement, reply }) {
            Ok(rows) => Some(Box::new(MySqlResponse {
                columns,
                rows: Rows::Buffered(rows.into()),
            })),
            Err(e) => {
                self.last_error = e.message;
                None
            }
        }
    }

    fn affected_rows(&self) -> u64 {
        self.outcome.as_ref().map_or(0, |o| o.affected_rows)
    }

    fn last_error(&self) -> String {
        self.last_error.clone()
    }

    fn close(self: Box<Self>) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).is_ok() {
            // An error here means the worker is already gone.
            let _ = done.blocking_recv();
        }
    }
}

/// Result set returned by `MySqlTransport`.
///
/// A buffered response holds every row of the result set. A streaming
/// response reads rows from the server as they are taken; until it has been
/// read to the end or dropped, the session rejects further statements.
pub struct MySqlResponse {
    columns: Vec<ColumnDescriptor>,
    rows: Rows,
}

enum Rows {
    Buffered(VecDeque<Row>),
    Streaming {
        statement: u64,
        commands: mpsc::UnboundedSender<Command>,
        finished: bool,
    },
}

impl MySqlResponse {
    /// Takes the next row, or `None` once the result set is exhausted.
    pub fn next_row(&mut self) -> std::result::Result<Option<Row>, TransportError> {
        match &mut self.rows {
            Rows::Buffered(rows) => Ok(rows.pop_front()),
            Rows::Streaming { finished: true, .. } => Ok(None),
            Rows::Streaming {
                statement,
                commands,
                finished,
            } => {
                let statement = *statement;
                let row = request(commands, |reply| Command::NextRow { statement, reply });
                if !matches!(row, Ok(Some(_))) {
                    *finished = true;
                }
                row
            }
        }
    }

    /// Rows held in memory and not yet taken. `None` for a streaming
    /// response, whose rows are still on the server.
    pub fn buffered_rows(&self) -> Option<usize> {
        match &self.rows {
            Rows::Buffered(rows) => Some(rows.len()),
            Rows::Streaming { .. } => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.rows, Rows::Streaming { .. })
    }
}

impl ResponseHandle for MySqlResponse {
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

impl Drop for MySqlResponse {
    fn drop(&mut self) {
        if let Rows::Streaming {
            statement,
            commands,
            finished: false,
        } = &self.rows
        {
            let _ = commands.send(Command::Release {
                statement: *statement,
            });
        }
    }
}

/// Sends a command to the worker and blocks until it answers.
fn request<T>(
    commands: &mpsc::UnboundedSender<Command>,
    command: impl FnOnce(Reply<T>) -> Command,
) -> std::result::Result<T, TransportError> {
    let (reply, answer) = oneshot::channel();
    commands
        .send(command(reply))
        .map_err(|_| lost_connection())?;
    answer.blocking_recv().map_err(|_| lost_connection())?
}

fn lost_connection() -> TransportError {
    TransportError::new("Lost connection to MySQL server")
}

/// Owns one connection and answers its session's commands until closed.
async fn serve(mut conn: Conn, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut closing = None;

    while let Some(command) = commands.recv().await {
        match command {
            Command::Query {
                statement,
                sql,
                reply,
            } => {
                closing = run_statement(&mut conn, statement, &sql, reply, &mut commands).await;
                if closing.is_some() {
                    break;
                }
            }
            Command::Close { reply } => {
                closing = Some(reply);
                break;
            }
            // Nothing is pending, so there is nothing left to read.
            Command::Store { reply, .. } => {
                let _ = reply.send(Ok(Vec::new()));
            }
            Command::NextRow { reply, .. } => {
                let _ = reply.send(Ok(None));
            }
            Command::Release { .. } => {}
        }
    }

    if let Err(e) = conn.disconnect().await {
        warn!("Error while closing MySQL session: {}", e);
    }
    if let Some(reply) = closing {
        let _ = reply.send(());
    }
}

/// Runs one statement and serves reads of its result set.
///
/// Returns the close request if one arrived while the result was open.
async fn run_statement(
    conn: &mut Conn,
    statement: u64,
    sql: &str,
    reply: Reply<Outcome>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<oneshot::Sender<()>> {
    let mut result = match conn.query_iter(sql).await {
        Ok(result) => result,
        Err(e) => {
            let _ = reply.send(Err(TransportError::new(format_query_error(&e))));
            return None;
        }
    };

    let outcome = Outcome {
        columns: result.columns_ref().iter().map(describe_column).collect(),
        affected_rows: result.affected_rows(),
    };
    let has_rows = !outcome.columns.is_empty();
    let _ = reply.send(Ok(outcome));

    let closing = if has_rows {
        serve_result(&mut result, statement, commands).await
    } else {
        None
    };

    if let Err(e) = result.drop_result().await {
        warn!("Failed to discard unread rows: {}", e);
    }
    closing
}

async fn serve_result(
    result: &mut QueryResult<'_, 'static, TextProtocol>,
    statement: u64,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Option<oneshot::Sender<()>> {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Store {
                statement: id,
                reply,
            } if id == statement => {
                let rows = result.collect::<Row>().await;
                let _ = reply.send(rows.map_err(|e| TransportError::new(format_query_error(&e))));
                return None;
            }
            Command::NextRow {
                statement: id,
                reply,
            } if id == statement => match result.next().await {
                Ok(Some(row)) => {
                    let _ = reply.send(Ok(Some(row)));
                }
                Ok(None) => {
                    let _ = reply.send(Ok(None));
                    return None;
                }
                Err(e) => {
                    let _ = reply.send(Err(TransportError::new(format_query_error(&e))));
                    return None;
                }
            },
            Command::Release { statement: id } if id == statement => return None,
            Command::Query { reply, .. } => {
                let _ = reply.send(Err(TransportError::new(COMMANDS_OUT_OF_SYNC)));
            }
            Command::Close { reply } => return Some(reply),
            // Requests left over from an earlier statement.
            Command::Store { reply, .. } => {
                let _ = reply.send(Ok(Vec::new()));
            }
            Command::NextRow { reply, .. } => {
                let _ = reply.send(Ok(None));
            }
            Command::Release { .. } => {}
        }
    }
    None
}

fn describe_column(column: &Column) -> ColumnDescriptor {
    let wire_flags = column.flags();
    let flags = ColumnFlags {
        unsigned: wire_flags.contains(WireFlags::UNSIGNED_FLAG),
        binary: column.character_set() == BINARY_CHARSET,
    };

    ColumnDescriptor {
        name: Some(column.name_str().into_owned()),
        server_type: server_type(column.column_type(), wire_flags),
        flags,
        length: Some(u64::from(column.column_length())),
        decimals: Some(column.decimals()),
    }
}

/// Maps a column-definition type code to a `ServerType`.
///
/// ENUM and SET columns arrive as strings carrying a marker flag.
fn server_type(column_type: ColumnType, flags: WireFlags) -> ServerType {
    use ColumnType::*;

    match column_type {
        MYSQL_TYPE_DECIMAL => ServerType::Decimal,
        MYSQL_TYPE_NEWDECIMAL => ServerType::NewDecimal,
        MYSQL_TYPE_TINY => ServerType::Tiny,
        MYSQL_TYPE_SHORT => ServerType::Short,
        MYSQL_TYPE_INT24 => ServerType::Int24,
        MYSQL_TYPE_LONG => ServerType::Long,
        MYSQL_TYPE_LONGLONG => ServerType::LongLong,
        MYSQL_TYPE_FLOAT => ServerType::Float,
        MYSQL_TYPE_DOUBLE => ServerType::Double,
        MYSQL_TYPE_NULL => ServerType::Null,
        MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_TIMESTAMP2 => ServerType::Timestamp,
        MYSQL_TYPE_DATE => ServerType::Date,
        MYSQL_TYPE_NEWDATE => ServerType::NewDate,
        MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => ServerType::Time,
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 => ServerType::DateTime,
        MYSQL_TYPE_YEAR => ServerType::Year,
        MYSQL_TYPE_BIT => ServerType::Bit,
        MYSQL_TYPE_JSON => ServerType::Json,
        MYSQL_TYPE_ENUM => ServerType::Enum,
        MYSQL_TYPE_SET => ServerType::Set,
        MYSQL_TYPE_STRING if flags.contains(WireFlags::ENUM_FLAG) => ServerType::Enum,
        MYSQL_TYPE_STRING if flags.contains(WireFlags::SET_FLAG) => ServerType::Set,
        MYSQL_TYPE_STRING => ServerType::String,
        MYSQL_TYPE_VARCHAR => ServerType::VarChar,
        MYSQL_TYPE_VAR_STRING => ServerType::VarString,
        MYSQL_TYPE_TINY_BLOB => ServerType::TinyBlob,
        MYSQL_TYPE_MEDIUM_BLOB => ServerType::MediumBlob,
        MYSQL_TYPE_LONG_BLOB => ServerType::LongBlob,
        MYSQL_TYPE_BLOB => ServerType::Blob,
        MYSQL_TYPE_GEOMETRY => ServerType::Geometry,
        other => {
            debug!("Unrecognized column type {:?}, reading as text", other);
            ServerType::VarString
        }
    }
}

/// Maps driver connection errors to readable messages.
fn map_connection_error(error: &mysql_async::Error) -> TransportError {
    let message = match error {
        mysql_async::Error::Server(e) if e.code == 1045 => {
            format!("Authentication failed. Check your credentials. ({})", e.message)
        }
        mysql_async::Error::Server(e) if e.code == 1049 => {
            format!("Database does not exist. ({})", e.message)
        }
        mysql_async::Error::Io(e) => {
            let text = e.to_string();
            let lower = text.to_lowercase();
            if lower.contains("connection refused") {
                "Cannot connect to the server. Check that it is running.".to_string()
            } else if lower.contains("timed out") {
                "Connection timed out. The server may be overloaded or unreachable.".to_string()
            } else {
                format!("Can't connect to MySQL server: {text}")
            }
        }
        other => other.to_string(),
    };

    TransportError::new(message)
}

/// Formats a statement error the way the mysql client prints it.
fn format_query_error(error: &mysql_async::Error) -> String {
    match error {
        mysql_async::Error::Server(e) => {
            format!("ERROR {} ({}): {}", e.code, e.state, e.message)
        }
        other => other.to_string(),
    }
}
