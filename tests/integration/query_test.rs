//! Query execution integration tests.
//!
//! Tests how responses are classified and how result sets are marshalled.

use db_conduit::db::{ColumnDescriptor, LogicalType, MockResponse, MockTransport, ServerType};
use db_conduit::query::MySqlTypeTranslator;
use db_conduit::{
    ConduitError, Connection, ConnectionOptions, DiagnosticSink, QueryResult, ResultStreaming,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::{Arc, Mutex};

fn transport() -> MockTransport {
    MockTransport::new()
        .with_response("CREATE TABLE t(x INT)", MockResponse::Affected(0))
        .with_response("INSERT INTO t VALUES (1)", MockResponse::Affected(1))
        .with_response(
            "SELECT x FROM t",
            MockResponse::rows(vec![ColumnDescriptor::new("x", ServerType::Long)], 1),
        )
        .with_response(
            "SELECT id, name, price FROM products",
            MockResponse::rows(
                vec![
                    ColumnDescriptor::new("id", ServerType::LongLong).unsigned(),
                    ColumnDescriptor::new("name", ServerType::VarString),
                    ColumnDescriptor::new("price", ServerType::NewDecimal)
                        .with_length(12)
                        .with_decimals(2),
                ],
                0,
            ),
        )
        .with_response(
            "SELECT lost FROM t",
            MockResponse::Missing {
                field_count: 1,
                message: "Lost connection to MySQL server during query".to_string(),
            },
        )
}

#[test]
fn test_insert_returns_count_only_result() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    let result = conn
        .query(
            "INSERT INTO t VALUES (1)",
            ResultStreaming::ForceMaterialization,
        )
        .unwrap();

    assert!(matches!(result, QueryResult::AffectedRows(1)));
    assert!(result.fields().is_empty());
}

#[test]
fn test_select_streaming_with_types() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    let result = conn
        .query_with_types(
            "SELECT x FROM t",
            ResultStreaming::AllowStreaming,
            &MySqlTypeTranslator::default(),
        )
        .unwrap();

    let rows = result.as_tabular().unwrap();
    assert_eq!(rows.fields().len(), 1);
    assert_eq!(rows.fields()[0].name.as_deref(), Some("x"));
    assert_eq!(rows.fields()[0].logical_type, LogicalType::Integer);
    assert!(rows.is_streaming());
    assert_eq!(transport.stats().streaming_requests, vec![true]);
}

#[test]
fn test_open_result_does_not_hold_connection_lock() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    let result = conn
        .query("SELECT x FROM t", ResultStreaming::AllowStreaming)
        .unwrap();
    let rows = result.as_tabular().unwrap();

    // Another thread can run a statement while the rows are still unread.
    std::thread::scope(|s| {
        s.spawn(|| conn.execute("INSERT INTO t VALUES (1)").unwrap())
            .join()
            .unwrap();
    });

    assert!(rows.is_streaming());
    assert_eq!(transport.stats().responses_released, 0);

    drop(result);
    assert_eq!(transport.stats().responses_released, 1);
}

#[test]
fn test_field_count_matches_transport() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    for streaming in [
        ResultStreaming::AllowStreaming,
        ResultStreaming::ForceMaterialization,
    ] {
        let result = conn
            .query_with_types(
                "SELECT id, name, price FROM products",
                streaming,
                &MySqlTypeTranslator::default(),
            )
            .unwrap();

        let rows = result.into_tabular().unwrap();
        assert_eq!(rows.fields().len(), rows.field_count());
        assert_eq!(rows.is_streaming(), streaming == ResultStreaming::AllowStreaming);
        let types: Vec<LogicalType> = rows.fields().iter().map(|f| f.logical_type).collect();
        assert_eq!(
            types,
            vec![
                LogicalType::UBigInt,
                LogicalType::Varchar,
                LogicalType::Decimal {
                    width: 10,
                    scale: 2
                },
            ]
        );
    }

    assert_eq!(transport.stats().responses_released, 2);
}

#[test]
fn test_missing_result_set_never_returns_empty_result() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    for streaming in [
        ResultStreaming::AllowStreaming,
        ResultStreaming::ForceMaterialization,
    ] {
        let err = conn.query("SELECT lost FROM t", streaming).unwrap_err();
        assert!(matches!(err, ConduitError::Connection(_)));
        assert!(err.to_string().contains("Failed to fetch result"));
    }
}

#[test]
fn test_invalid_statement_error_contains_text() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    let err = conn
        .query("SELEKT * FORM t", ResultStreaming::ForceMaterialization)
        .unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("SELEKT * FORM t"));
}

#[test]
fn test_translation_failure_does_not_leak_handle() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    let translator = |column: &ColumnDescriptor| -> db_conduit::Result<LogicalType> {
        match column.server_type {
            ServerType::NewDecimal => Err(ConduitError::type_error("decimals not supported")),
            _ => Ok(LogicalType::Varchar),
        }
    };

    let err = conn
        .query_with_types(
            "SELECT id, name, price FROM products",
            ResultStreaming::AllowStreaming,
            &translator,
        )
        .unwrap_err();
    assert!(matches!(err, ConduitError::Type(_)));
    assert_eq!(transport.stats().responses_released, 1);

    // The session is still usable afterwards.
    conn.execute("INSERT INTO t VALUES (1)").unwrap();
}

#[test]
fn test_print_queries_echoes_each_statement_once() {
    let transport = transport();
    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink: Arc<Mutex<dyn Write + Send>> = buffer.clone();
    let options = ConnectionOptions::default().with_sink(DiagnosticSink::Writer(sink));
    let conn = Connection::open_with_options(&transport, "mock", options).unwrap();

    conn.execute("CREATE TABLE t(x INT)").unwrap();
    assert!(buffer.lock().unwrap().is_empty());

    conn.set_print_queries(true);
    conn.execute("CREATE TABLE t(x INT)").unwrap();
    let result = conn
        .query(
            "INSERT INTO t VALUES (1)",
            ResultStreaming::ForceMaterialization,
        )
        .unwrap();
    assert_eq!(result.affected_rows(), Some(1));
    let _ = conn.execute("SELEKT 1");

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert_eq!(
        output,
        "CREATE TABLE t(x INT)\nINSERT INTO t VALUES (1)\nSELEKT 1\n"
    );
}

#[test]
fn test_print_queries_from_options() {
    let transport = transport();
    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink: Arc<Mutex<dyn Write + Send>> = buffer.clone();
    let options = ConnectionOptions::default()
        .with_print_queries(true)
        .with_sink(DiagnosticSink::Writer(sink));
    let conn = Connection::open_with_options(&transport, "mock", options).unwrap();
    assert!(conn.print_queries());

    conn.query("SELECT x FROM t", ResultStreaming::AllowStreaming)
        .unwrap();

    let output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert_eq!(output, "SELECT x FROM t\n");
}
