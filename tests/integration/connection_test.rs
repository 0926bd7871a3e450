//! Connection lifecycle integration tests.
//!
//! Tests opening, closing and transferring sessions.

use db_conduit::db::{MockResponse, MockTransport};
use db_conduit::{Connection, ResultStreaming};
use std::sync::Arc;
use std::thread;

fn transport() -> MockTransport {
    MockTransport::new()
        .with_response("CREATE TABLE t(x INT)", MockResponse::Affected(0))
        .with_response("INSERT INTO t VALUES (1)", MockResponse::Affected(1))
}

#[test]
fn test_open_valid_dsn_and_execute_ddl() {
    let transport = transport();
    let conn = Connection::open(&transport, "host=localhost database=shop").unwrap();

    conn.execute("CREATE TABLE t(x INT)").unwrap();
    assert!(conn.is_open());
}

#[test]
fn test_open_unreachable_server() {
    let transport = transport().reject_dsn("host=unreachable");

    let err = Connection::open(&transport, "host=unreachable").unwrap_err();
    assert!(err.is_connection());
    assert!(err.to_string().contains("host=unreachable"));
    assert_eq!(transport.stats().sessions_opened, 0);
}

#[test]
fn test_close_is_idempotent() {
    let transport = transport();
    let conn = Connection::open(&transport, "mock").unwrap();

    conn.close();
    assert!(!conn.is_open());
    conn.close();
    assert!(!conn.is_open());

    drop(conn);
    assert_eq!(transport.stats().sessions_closed, 1);
}

#[test]
fn test_transfer_leaves_source_closed() {
    let transport = transport();
    let mut a = Connection::open(&transport, "mock").unwrap();
    let was_open = a.is_open();

    let b = a.take();
    assert!(!a.is_open());
    assert_eq!(b.is_open(), was_open);

    // Queries on the source fail instead of reaching the session.
    assert!(a.execute("CREATE TABLE t(x INT)").is_err());
    b.execute("CREATE TABLE t(x INT)").unwrap();

    drop(a);
    drop(b);
    let stats = transport.stats();
    assert_eq!(stats.sessions_closed, 1);
    assert_eq!(stats.submitted, vec!["CREATE TABLE t(x INT)"]);
}

#[test]
fn test_transfer_of_closed_connection() {
    let transport = transport();
    let mut a = Connection::open(&transport, "mock").unwrap();
    a.close();

    let b = a.take();
    assert!(!a.is_open());
    assert!(!b.is_open());

    drop(b);
    assert_eq!(transport.stats().sessions_closed, 1);
}

#[test]
fn test_concurrent_queries_share_one_session() {
    let transport = transport();
    let conn = Arc::new(Connection::open(&transport, "mock").unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let conn = Arc::clone(&conn);
            thread::spawn(move || {
                for _ in 0..25 {
                    let result = conn
                        .query(
                            "INSERT INTO t VALUES (1)",
                            ResultStreaming::ForceMaterialization,
                        )
                        .unwrap();
                    assert_eq!(result.affected_rows(), Some(1));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = transport.stats();
    assert_eq!(stats.submitted.len(), 100);
    assert_eq!(stats.sessions_opened, 1);
}
