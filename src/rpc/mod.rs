//! RPC capability used by the runtime.
//!
//! Provides a trait-based interface for the remote CLI service, so the
//! polling, paging and decoding layers can run against a real Thrift
//! transport or the in-memory mock interchangeably.

mod mock;
pub mod types;

pub use mock::{calls, MockCliService, MockFailure, MockOperation};
pub use types::{
    CancelOperationResp, CloseOperationResp, CloseSessionResp, ColumnDesc, ExecuteStatementReq,
    ExecuteStatementResp, FetchOrientation, FetchResultsReq, FetchResultsResp,
    GetOperationStatusResp, GetResultSetMetadataResp, HandleIdentifier, OpenSessionReq,
    OpenSessionResp, OperationHandle, OperationState, OperationType, RawColumnValue, RawRow,
    RawRowSet, RpcStatus, SessionHandle, StatusCode, TypeTag, CLIENT_PROTOCOL_VERSION,
};

use crate::error::Result;
use async_trait::async_trait;

/// Trait defining the remote CLI service calls the runtime relies on.
///
/// Each method is one request/response round trip. Implementations return
/// `HiveError::Transport` when the round trip itself fails; a response that
/// arrives with a non-success `RpcStatus` is returned as `Ok` and classified
/// by the caller.
///
/// Implementations are shared between a `Connection` and all of its
/// `RowSet`s. An implementation over a single socket must serialize
/// concurrent requests itself.
#[async_trait]
pub trait CliService: Send + Sync {
    /// Opens a session.
    async fn open_session(&self, req: OpenSessionReq) -> Result<OpenSessionResp>;

    /// Closes a session and releases its server-side resources.
    async fn close_session(&self, session: &SessionHandle) -> Result<CloseSessionResp>;

    /// Submits a statement; the response carries the new operation handle.
    async fn execute_statement(&self, req: ExecuteStatementReq) -> Result<ExecuteStatementResp>;

    /// Reports the current execution state of an operation.
    async fn get_operation_status(
        &self,
        operation: &OperationHandle,
    ) -> Result<GetOperationStatusResp>;

    /// Returns column descriptors for a finished operation.
    async fn get_result_set_metadata(
        &self,
        operation: &OperationHandle,
    ) -> Result<GetResultSetMetadataResp>;

    /// Fetches the next page of rows.
    async fn fetch_results(&self, req: FetchResultsReq) -> Result<FetchResultsResp>;

    /// Requests cancellation of a running operation.
    async fn cancel_operation(&self, operation: &OperationHandle) -> Result<CancelOperationResp>;

    /// Releases an operation's server-side resources.
    async fn close_operation(&self, operation: &OperationHandle) -> Result<CloseOperationResp>;
}

/// Maps a non-success RPC status to `HiveError::Server`.
pub(crate) fn check_status(call: &'static str, status: &RpcStatus) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(crate::error::HiveError::server(call, status.to_string()))
    }
}
