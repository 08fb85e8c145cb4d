//! Wire types exchanged with the remote CLI service.
//!
//! These mirror the HiveServer2 `TCLIService` request and response shapes.
//! Optional fields stay `Option` because the server may omit them; the
//! components above this layer decide which omissions are protocol errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version sent with `OpenSession`.
pub const CLIENT_PROTOCOL_VERSION: i32 = 7;

/// Server-assigned identifier pair backing session and operation handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleIdentifier {
    pub guid: Vec<u8>,
    pub secret: Vec<u8>,
}

/// Identifies an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: HandleIdentifier,
}

/// Kind of operation a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    ExecuteStatement,
    GetTypeInfo,
    GetCatalogs,
    GetSchemas,
    GetTables,
    GetTableTypes,
    GetColumns,
    GetFunctions,
    Unknown,
}

/// Opaque identifier for a submitted asynchronous operation.
///
/// Handles are plain values: once a server hands one out it never changes.
/// Equality compares `modified_row_count` bitwise, so a NaN count equals
/// itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationHandle {
    pub id: HandleIdentifier,
    pub operation_type: OperationType,
    pub has_result_set: bool,
    pub modified_row_count: Option<f64>,
}

impl PartialEq for OperationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.operation_type == other.operation_type
            && self.has_result_set == other.has_result_set
            && self.modified_row_count.map(f64::to_bits)
                == other.modified_row_count.map(f64::to_bits)
    }
}

/// Status code attached to every RPC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    SuccessWithInfo,
    StillExecuting,
    Error,
    InvalidHandle,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS_STATUS",
            Self::SuccessWithInfo => "SUCCESS_WITH_INFO_STATUS",
            Self::StillExecuting => "STILL_EXECUTING_STATUS",
            Self::Error => "ERROR_STATUS",
            Self::InvalidHandle => "INVALID_HANDLE_STATUS",
        }
    }
}

/// The RPC-level status of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: StatusCode,
    pub info_messages: Vec<String>,
    pub sql_state: Option<String>,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
}

impl RpcStatus {
    /// A plain success status.
    pub fn success() -> Self {
        Self::with_code(StatusCode::Success)
    }

    /// An error status carrying the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::with_code(StatusCode::Error)
        }
    }

    pub fn with_code(code: StatusCode) -> Self {
        Self {
            code,
            info_messages: Vec::new(),
            sql_state: None,
            error_code: None,
            error_message: None,
        }
    }

    /// SUCCESS and SUCCESS_WITH_INFO both count as success.
    pub fn is_success(&self) -> bool {
        matches!(self.code, StatusCode::Success | StatusCode::SuccessWithInfo)
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code.as_str())?;
        if let Some(state) = &self.sql_state {
            write!(f, " [{state}]")?;
        }
        if let Some(code) = self.error_code {
            write!(f, " (code {code})")?;
        }
        if let Some(message) = &self.error_message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Execution state of a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    Initialized,
    Running,
    Finished,
    Canceled,
    Closed,
    Error,
    Unknown,
    Pending,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "INITIALIZED_STATE",
            Self::Running => "RUNNING_STATE",
            Self::Finished => "FINISHED_STATE",
            Self::Canceled => "CANCELED_STATE",
            Self::Closed => "CLOSED_STATE",
            Self::Error => "ERROR_STATE",
            // Spelled this way on the wire.
            Self::Unknown => "UKNOWN_STATE",
            Self::Pending => "PENDING_STATE",
        }
    }

    /// True for states the operation never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Canceled | Self::Closed | Self::Error
        )
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    String,
    Timestamp,
    Binary,
    Decimal,
    Date,
    Varchar,
    Char,
    Array,
    Map,
    Struct,
    Other(i32),
}

/// Describes one column of a result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDesc {
    pub name: String,
    pub type_tag: TypeTag,
    pub position: i32,
    pub comment: Option<String>,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, type_tag: TypeTag, position: i32) -> Self {
        Self {
            name: name.into(),
            type_tag,
            position,
            comment: None,
        }
    }
}

/// A single column value as it arrives on the wire.
///
/// At most one field is expected to be set. A value with none set is a
/// decode error, not NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawColumnValue {
    pub string_val: Option<String>,
    pub bool_val: Option<bool>,
    pub byte_val: Option<i8>,
    pub i16_val: Option<i16>,
    pub i32_val: Option<i32>,
    pub i64_val: Option<i64>,
    pub double_val: Option<f64>,
}

impl RawColumnValue {
    pub fn string(v: impl Into<String>) -> Self {
        Self {
            string_val: Some(v.into()),
            ..Self::default()
        }
    }

    pub fn bool(v: bool) -> Self {
        Self {
            bool_val: Some(v),
            ..Self::default()
        }
    }

    pub fn byte(v: i8) -> Self {
        Self {
            byte_val: Some(v),
            ..Self::default()
        }
    }

    pub fn i16(v: i16) -> Self {
        Self {
            i16_val: Some(v),
            ..Self::default()
        }
    }

    pub fn i32(v: i32) -> Self {
        Self {
            i32_val: Some(v),
            ..Self::default()
        }
    }

    pub fn i64(v: i64) -> Self {
        Self {
            i64_val: Some(v),
            ..Self::default()
        }
    }

    pub fn double(v: f64) -> Self {
        Self {
            double_val: Some(v),
            ..Self::default()
        }
    }
}

/// One row of raw column values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub values: Vec<RawColumnValue>,
}

impl RawRow {
    pub fn new(values: Vec<RawColumnValue>) -> Self {
        Self { values }
    }
}

/// A page of raw rows returned by `FetchResults`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRowSet {
    pub start_row_offset: i64,
    pub rows: Vec<RawRow>,
}

/// Fetch direction; the runtime only ever asks for the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchOrientation {
    Next,
    Prior,
    Relative,
    Absolute,
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSessionReq {
    pub client_protocol: i32,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSessionResp {
    pub status: RpcStatus,
    pub server_protocol: i32,
    pub session_handle: Option<SessionHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseSessionResp {
    pub status: RpcStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteStatementReq {
    pub session_handle: SessionHandle,
    pub statement: String,
    pub run_async: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteStatementResp {
    pub status: RpcStatus,
    pub operation_handle: Option<OperationHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOperationStatusResp {
    pub status: RpcStatus,
    pub operation_state: Option<OperationState>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResultSetMetadataResp {
    pub status: RpcStatus,
    pub columns: Option<Vec<ColumnDesc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResultsReq {
    pub operation_handle: OperationHandle,
    pub orientation: FetchOrientation,
    pub max_rows: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResultsResp {
    pub status: RpcStatus,
    pub has_more_rows: Option<bool>,
    pub results: Option<RawRowSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOperationResp {
    pub status: RpcStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseOperationResp {
    pub status: RpcStatus,
}
