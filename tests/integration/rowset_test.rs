//! Row set iteration tests.
//!
//! Tests waiting, paging, decoding and scanning through the public API.

use super::{connect, users, SELECT_USERS};
use futures::StreamExt;
use hivething::rpc::{calls, MockFailure, OperationState, RpcStatus};
use hivething::{HiveError, Lifecycle, Value};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_advance_is_true_exactly_n_times() {
    for (n, batch_size) in [(0, 3), (1, 3), (3, 3), (7, 3), (10, 1), (5, 10_000)] {
        let (mock, conn) = connect(users(n), batch_size).await;
        let mut rows = assert_ok!(conn.query(SELECT_USERS).await);

        let mut count = 0;
        while rows.advance().await {
            count += 1;
        }
        assert_eq!(count, n, "rows for n={n} batch={batch_size}");
        assert!(rows.last_error().is_none());

        let fetches = mock.fetch_count();
        for _ in 0..3 {
            assert!(!rows.advance().await);
        }
        assert_eq!(mock.fetch_count(), fetches, "no fetch after exhaustion");
    }
}

#[tokio::test]
async fn test_batch_of_two_over_three_rows() {
    let (mock, conn) = connect(users(3), 2).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);

    for expected in 0..3i64 {
        assert!(rows.advance().await);
        let row = assert_ok!(rows.current_row());
        assert_eq!(row[0], Value::I64(expected));
    }
    assert!(!rows.advance().await);
    assert!(!rows.advance().await);
    assert_eq!(mock.fetch_count(), 2);
}

#[tokio::test]
async fn test_decoded_row_values() {
    let (_mock, conn) = connect(users(2), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);

    assert_eq!(
        assert_ok!(rows.column_names().await),
        vec!["users.id", "users.email", "users.active", "users.score"]
    );

    let second = {
        assert!(rows.advance().await);
        assert!(rows.advance().await);
        assert_ok!(rows.current_row()).clone()
    };
    assert_eq!(
        second,
        vec![
            Value::I64(1),
            Value::from("user1@example.com"),
            Value::Bool(false),
            Value::Double(1.5),
        ]
    );
}

#[tokio::test]
async fn test_scan_typed_destinations() {
    let (_mock, conn) = connect(users(1), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert!(rows.advance().await);

    let mut id: i64 = -1;
    let mut email = String::new();
    let mut active = false;
    let mut score: f64 = -1.0;
    assert_ok!(rows.scan(&mut [&mut id, &mut email, &mut active, &mut score]));
    assert_eq!(id, 0);
    assert_eq!(email, "user0@example.com");
    assert!(active);
    assert_eq!(score, 0.0);
}

#[tokio::test]
async fn test_scan_arity_never_truncates_or_pads() {
    let (_mock, conn) = connect(users(1), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert!(rows.advance().await);

    let mut id: i64 = -1;
    let mut email = String::new();
    let err = assert_err!(rows.scan(&mut [&mut id, &mut email]));
    assert_eq!(
        err,
        HiveError::Arity {
            expected: 4,
            actual: 2
        }
    );
    assert_eq!(id, -1);
    assert!(email.is_empty());
}

#[tokio::test]
async fn test_scan_narrowing_is_type_mismatch() {
    let (_mock, conn) = connect(users(1), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert!(rows.advance().await);

    // users.id is a BIGINT, so an i32 destination is rejected.
    let mut id: i32 = 0;
    let (mut email, mut active, mut score) = (String::new(), false, 0.0f64);
    let err = assert_err!(rows.scan(&mut [&mut id, &mut email, &mut active, &mut score]));
    assert!(err.is_scan_error());
    assert!(matches!(err, HiveError::TypeMismatch { column: 0, target: "i32", .. }));
}

#[tokio::test]
async fn test_wait_reports_terminal_status() {
    let (mock, conn) = connect(users(1).with_running_polls(2), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert_eq!(rows.lifecycle(), Lifecycle::Pending);

    let status = assert_ok!(rows.wait().await);
    assert!(status.is_complete());
    assert!(status.is_success());
    assert_eq!(status.to_string(), "FINISHED_STATE");
    assert_eq!(mock.status_count(), 3);
    assert_eq!(rows.lifecycle(), Lifecycle::Ready);
}

#[tokio::test]
async fn test_poll_does_not_change_lifecycle() {
    let (_mock, conn) = connect(users(1).with_running_polls(1), 100).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);

    let status = assert_ok!(rows.poll().await);
    assert_eq!(status.state(), Some(OperationState::Running));
    assert!(!status.is_complete());
    assert_eq!(rows.lifecycle(), Lifecycle::Pending);
}

#[tokio::test]
async fn test_failed_operation_surfaces_server_message() {
    let (_mock, conn) = connect(
        hivething::rpc::MockOperation::failed(OperationState::Error, "Table not found 'users'"),
        100,
    )
    .await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);

    let err = assert_err!(rows.next_row().await);
    assert_eq!(
        err.to_string(),
        "Query failed execution: ERROR_STATE: Table not found 'users'"
    );
    assert_eq!(rows.lifecycle(), Lifecycle::Failed);
}

#[tokio::test]
async fn test_wait_timeout_then_resume() {
    let (_mock, conn) = connect(users(2).with_running_polls(usize::MAX), 100).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);

    let err = assert_err!(rows.wait_timeout(Duration::from_millis(10)).await);
    assert_eq!(err, HiveError::Timeout(Duration::from_millis(10)));
    assert_eq!(err.category(), "Timeout");
    assert_eq!(rows.lifecycle(), Lifecycle::Pending);

    assert_ok!(rows.cancel().await);
    let err = assert_err!(rows.wait().await);
    assert!(matches!(err, HiveError::OperationFailed { .. }));
}

#[tokio::test]
async fn test_transient_fetch_error_is_recorded() {
    let (mock, conn) = connect(users(4), 2).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert_ok!(rows.wait().await);

    mock.fail_next(
        calls::FETCH_RESULTS,
        MockFailure::Status(RpcStatus::error("Exceeded max memory")),
    );
    assert!(!rows.advance().await);
    let err = rows.last_error().cloned();
    assert!(matches!(err, Some(HiveError::Server { call: "FetchResults", .. })));

    let mut count = 0;
    while rows.advance().await {
        count += 1;
    }
    assert_eq!(count, 4);
}

#[tokio::test]
async fn test_stream_collects_every_row() {
    let (mock, conn) = connect(users(9), 4).await;
    let rows = assert_ok!(conn.query(SELECT_USERS).await);

    let ids: Vec<i64> = rows
        .into_stream()
        .map(|row| row.map(|r| r[0].as_i64().unwrap_or(-1)))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(ids, (0..9).collect::<Vec<_>>());
    assert_eq!(mock.fetch_count(), 3);
}

#[tokio::test]
async fn test_close_operation() {
    let (mock, conn) = connect(users(3), 2).await;
    let mut rows = assert_ok!(conn.query(SELECT_USERS).await);
    assert!(rows.advance().await);

    let op = rows.operation().clone();
    assert_ok!(rows.close().await);
    assert!(mock.is_closed(&op));
}
