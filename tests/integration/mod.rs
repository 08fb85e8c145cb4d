//! End-to-end tests over the mock CLI service.

pub mod connection_test;
pub mod reattach_test;
pub mod rowset_test;

use hivething::rpc::{ColumnDesc, MockCliService, MockOperation, RawColumnValue, RawRow, TypeTag};
use hivething::{Connection, ConnectionConfig, Options};
use std::sync::Arc;
use std::time::Duration;

pub const SELECT_USERS: &str = "SELECT id, email, active, score FROM users";

/// Options tuned for tests: near-instant polling.
pub fn test_options(batch_size: i64) -> Options {
    Options::default()
        .with_poll_interval(Duration::from_millis(1))
        .with_batch_size(batch_size)
}

/// A `users` result with `n` rows covering several value types.
pub fn users(n: i64) -> MockOperation {
    let columns = vec![
        ColumnDesc::new("users.id", TypeTag::BigInt, 1),
        ColumnDesc::new("users.email", TypeTag::String, 2),
        ColumnDesc::new("users.active", TypeTag::Boolean, 3),
        ColumnDesc::new("users.score", TypeTag::Double, 4),
    ];
    let rows = (0..n)
        .map(|i| {
            RawRow::new(vec![
                RawColumnValue::i64(i),
                RawColumnValue::string(format!("user{i}@example.com")),
                RawColumnValue::bool(i % 2 == 0),
                RawColumnValue::double(i as f64 * 1.5),
            ])
        })
        .collect();
    MockOperation::finished(columns, rows)
}

/// Opens a connection on a fresh mock that knows `SELECT_USERS`.
pub async fn connect(op: MockOperation, batch_size: i64) -> (Arc<MockCliService>, Connection) {
    let mock = Arc::new(MockCliService::new().with_statement(SELECT_USERS, op));
    let config = ConnectionConfig::from_connection_string("hive2://hive@localhost:10000")
        .expect("valid connection string");
    let conn = Connection::open(mock.clone(), &config, test_options(batch_size))
        .await
        .expect("session opens");
    (mock, conn)
}
