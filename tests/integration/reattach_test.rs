//! Reattach tests.
//!
//! A serialized handle taken from one row set must rebuild an equivalent
//! row set in a later session without re-submitting the statement.

use super::{connect, test_options, users, SELECT_USERS};
use hivething::rpc::{MockOperation, OperationState};
use hivething::{handle, Connection, ConnectionConfig, HiveError, Lifecycle, Row, RowSet};
use pretty_assertions::assert_eq;
use tokio_test::{assert_err, assert_ok};

async fn drain(rows: &mut RowSet) -> Vec<Row> {
    let mut out = Vec::new();
    while let Some(row) = rows.next_row().await.unwrap() {
        out.push(row);
    }
    out
}

#[tokio::test]
async fn test_reattach_yields_same_columns_and_rows() {
    let (mock, conn) = connect(users(5), 2).await;

    let mut fresh = assert_ok!(conn.query(SELECT_USERS).await);
    let expected_columns = assert_ok!(fresh.column_names().await);
    let expected_rows = drain(&mut fresh).await;

    let detached = assert_ok!(conn.query(SELECT_USERS).await);
    let bytes = assert_ok!(detached.handle());
    drop(detached);
    let submitted = mock.execute_count();

    // A new session on the same service.
    let config = ConnectionConfig::from_connection_string("hive2://other@localhost:10000").unwrap();
    let later = assert_ok!(Connection::open(mock.clone(), &config, test_options(2)).await);
    let mut reattached = assert_ok!(later.reattach(&bytes));

    assert_eq!(assert_ok!(reattached.column_names().await), expected_columns);
    assert_eq!(drain(&mut reattached).await, expected_rows);
    assert_eq!(mock.execute_count(), submitted, "reattach must not re-submit");
}

#[tokio::test]
async fn test_reattach_before_completion() {
    let (mock, conn) = connect(users(2).with_running_polls(3), 10).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);
    let bytes = assert_ok!(rows.handle());
    assert_eq!(mock.status_count(), 0);

    let mut reattached = assert_ok!(conn.reattach(&bytes));
    assert_eq!(reattached.lifecycle(), Lifecycle::Pending);
    assert_eq!(reattached.operation(), rows.operation());
    assert_eq!(drain(&mut reattached).await.len(), 2);
}

#[tokio::test]
async fn test_reattach_via_text_handle() {
    let (_mock, conn) = connect(users(1), 10).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);

    let text = assert_ok!(handle::encode_text(rows.operation()));
    let op = assert_ok!(handle::decode_text(&text));
    let bytes = assert_ok!(handle::serialize(&op));
    let mut reattached = assert_ok!(conn.reattach(&bytes));
    assert!(reattached.advance().await);
}

#[tokio::test]
async fn test_reattach_to_failed_operation_reports_failure() {
    let (_mock, conn) = connect(MockOperation::failed(OperationState::Canceled, "killed"), 10).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);
    let bytes = assert_ok!(rows.handle());

    let mut reattached = assert_ok!(conn.reattach(&bytes));
    let err = assert_err!(reattached.wait().await);
    assert!(matches!(
        err,
        HiveError::OperationFailed { ref state, .. } if state == "CANCELED_STATE"
    ));
}

#[tokio::test]
async fn test_reattach_rejects_malformed_handles() {
    let (_mock, conn) = connect(users(1), 10).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);
    let bytes = assert_ok!(rows.handle());

    assert!(matches!(assert_err!(conn.reattach(&[])), HiveError::Decode(_)));
    assert!(matches!(
        assert_err!(conn.reattach(&bytes[..bytes.len() / 2])),
        HiveError::Decode(_)
    ));
    let mut padded = bytes.clone();
    padded.push(0);
    assert!(matches!(assert_err!(conn.reattach(&padded)), HiveError::Decode(_)));
}
