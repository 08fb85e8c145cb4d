//! hivething - an async client runtime for HiveServer2-style CLI services.
//!
//! Submit a statement through a [`Connection`], then read the returned
//! [`RowSet`]: it waits for the remote operation, fetches results in
//! batches and decodes them into typed [`Value`]s.

pub mod config;
pub mod connection;
pub mod decode;
pub mod error;
pub mod handle;
pub mod logging;
pub mod pager;
pub mod rowset;
pub mod rpc;
pub mod scan;
pub mod status;
pub mod value;

pub use config::{Config, ConnectionConfig, Options};
pub use connection::Connection;
pub use error::{HiveError, Result};
pub use rowset::{Lifecycle, RowSet};
pub use scan::ScanTarget;
pub use status::{Status, StatusPoller};
pub use value::{Row, Value};
