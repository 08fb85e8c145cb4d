//! Mock CLI service for testing.
//!
//! Provides an in-memory engine that runs scripted statements: each one
//! reports RUNNING for a configurable number of polls, then settles in its
//! final state and serves its rows in pages of at most `max_rows`.

use super::types::*;
use super::CliService;
use crate::error::{HiveError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Script for one statement the mock knows how to run.
#[derive(Debug, Clone)]
pub struct MockOperation {
    columns: Vec<ColumnDesc>,
    rows: Vec<RawRow>,
    running_polls: usize,
    final_state: OperationState,
    error_message: Option<String>,
}

impl MockOperation {
    /// An operation that finishes with the given columns and rows.
    pub fn finished(columns: Vec<ColumnDesc>, rows: Vec<RawRow>) -> Self {
        Self {
            columns,
            rows,
            running_polls: 0,
            final_state: OperationState::Finished,
            error_message: None,
        }
    }

    /// An operation that produces no result set, like DDL.
    pub fn no_results() -> Self {
        Self::finished(Vec::new(), Vec::new())
    }

    /// An operation that ends in a non-success terminal state.
    pub fn failed(state: OperationState, message: impl Into<String>) -> Self {
        Self {
            final_state: state,
            error_message: Some(message.into()),
            ..Self::no_results()
        }
    }

    /// Reports RUNNING for the first `polls` status checks.
    pub fn with_running_polls(mut self, polls: usize) -> Self {
        self.running_polls = polls;
        self
    }
}

/// A scripted misbehaviour for the next call of one RPC.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// The round trip fails at the transport layer.
    Transport(String),
    /// The server answers with this status and no payload.
    Status(RpcStatus),
    /// The server answers SUCCESS but leaves the payload field unset.
    OmitPayload,
}

/// RPC names accepted by [`MockCliService::fail_next`].
pub mod calls {
    pub const OPEN_SESSION: &str = "OpenSession";
    pub const CLOSE_SESSION: &str = "CloseSession";
    pub const EXECUTE_STATEMENT: &str = "ExecuteStatement";
    pub const GET_OPERATION_STATUS: &str = "GetOperationStatus";
    pub const GET_RESULT_SET_METADATA: &str = "GetResultSetMetadata";
    pub const FETCH_RESULTS: &str = "FetchResults";
    pub const CANCEL_OPERATION: &str = "CancelOperation";
    pub const CLOSE_OPERATION: &str = "CloseOperation";
}

#[derive(Debug)]
struct RunningOperation {
    script: MockOperation,
    polls_remaining: usize,
    cursor: usize,
    canceled: bool,
    closed: bool,
}

impl RunningOperation {
    fn state(&self) -> OperationState {
        if self.closed {
            OperationState::Closed
        } else if self.canceled {
            OperationState::Canceled
        } else if self.polls_remaining > 0 {
            OperationState::Running
        } else {
            self.script.final_state
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    statements: HashMap<String, MockOperation>,
    operations: HashMap<Vec<u8>, RunningOperation>,
    sessions: Vec<Vec<u8>>,
    failures: HashMap<&'static str, MockFailure>,
}

/// An in-memory `CliService` with call counters and failure injection.
#[derive(Debug, Default)]
pub struct MockCliService {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    execute_calls: AtomicUsize,
    status_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl MockCliService {
    /// Creates a mock that knows no statements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a statement script, builder style.
    pub fn with_statement(self, statement: &str, op: MockOperation) -> Self {
        self.add_statement(statement, op);
        self
    }

    /// Registers a statement script.
    pub fn add_statement(&self, statement: &str, op: MockOperation) {
        self.lock()
            .statements
            .insert(statement.trim().to_string(), op);
    }

    /// Makes the next call of `call` misbehave once.
    pub fn fail_next(&self, call: &'static str, failure: MockFailure) {
        self.lock().failures.insert(call, failure);
    }

    pub fn execute_count(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn status_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn close_operation_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of sessions currently open.
    pub fn open_session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Returns true if the operation was cancelled through the service.
    pub fn is_canceled(&self, operation: &OperationHandle) -> bool {
        self.lock()
            .operations
            .get(&operation.id.guid)
            .is_some_and(|op| op.canceled)
    }

    /// Returns true if the operation was closed through the service.
    pub fn is_closed(&self, operation: &OperationHandle) -> bool {
        self.lock()
            .operations
            .get(&operation.id.guid)
            .is_some_and(|op| op.closed)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mint_id(&self) -> HandleIdentifier {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        HandleIdentifier {
            guid: n.to_be_bytes().to_vec(),
            secret: n.rotate_left(17).to_le_bytes().to_vec(),
        }
    }

    /// Pulls the scripted failure for `call`; transport failures become `Err`.
    fn take_failure(&self, call: &'static str) -> Result<Option<MockFailure>> {
        match self.lock().failures.remove(call) {
            Some(MockFailure::Transport(msg)) => Err(HiveError::transport(msg)),
            other => Ok(other),
        }
    }
}

fn invalid_handle() -> RpcStatus {
    RpcStatus {
        error_message: Some("Invalid OperationHandle".to_string()),
        ..RpcStatus::with_code(StatusCode::InvalidHandle)
    }
}

#[async_trait]
impl CliService for MockCliService {
    async fn open_session(&self, _req: OpenSessionReq) -> Result<OpenSessionResp> {
        let failure = self.take_failure(calls::OPEN_SESSION)?;
        let status = match failure {
            Some(MockFailure::Status(status)) => {
                return Ok(OpenSessionResp {
                    status,
                    server_protocol: CLIENT_PROTOCOL_VERSION,
                    session_handle: None,
                })
            }
            Some(MockFailure::OmitPayload) => {
                return Ok(OpenSessionResp {
                    status: RpcStatus::success(),
                    server_protocol: CLIENT_PROTOCOL_VERSION,
                    session_handle: None,
                })
            }
            _ => RpcStatus::success(),
        };

        let id = self.mint_id();
        self.lock().sessions.push(id.guid.clone());
        Ok(OpenSessionResp {
            status,
            server_protocol: CLIENT_PROTOCOL_VERSION,
            session_handle: Some(SessionHandle { id }),
        })
    }

    async fn close_session(&self, session: &SessionHandle) -> Result<CloseSessionResp> {
        if let Some(MockFailure::Status(status)) = self.take_failure(calls::CLOSE_SESSION)? {
            return Ok(CloseSessionResp { status });
        }
        let mut state = self.lock();
        let before = state.sessions.len();
        state.sessions.retain(|guid| guid != &session.id.guid);
        let status = if state.sessions.len() < before {
            RpcStatus::success()
        } else {
            RpcStatus::error("Invalid SessionHandle")
        };
        Ok(CloseSessionResp { status })
    }

    async fn execute_statement(&self, req: ExecuteStatementReq) -> Result<ExecuteStatementResp> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        match self.take_failure(calls::EXECUTE_STATEMENT)? {
            Some(MockFailure::Status(status)) => {
                return Ok(ExecuteStatementResp {
                    status,
                    operation_handle: None,
                })
            }
            Some(MockFailure::OmitPayload) => {
                return Ok(ExecuteStatementResp {
                    status: RpcStatus::success(),
                    operation_handle: None,
                })
            }
            _ => {}
        }

        let script = {
            let state = self.lock();
            if !state.sessions.contains(&req.session_handle.id.guid) {
                return Ok(ExecuteStatementResp {
                    status: RpcStatus::error("Invalid SessionHandle"),
                    operation_handle: None,
                });
            }
            state.statements.get(req.statement.trim()).cloned()
        };
        let Some(script) = script else {
            return Ok(ExecuteStatementResp {
                status: RpcStatus::error(format!(
                    "Error while compiling statement: {}",
                    req.statement
                )),
                operation_handle: None,
            });
        };

        let handle = OperationHandle {
            id: self.mint_id(),
            operation_type: OperationType::ExecuteStatement,
            has_result_set: !script.columns.is_empty(),
            modified_row_count: None,
        };
        self.lock().operations.insert(
            handle.id.guid.clone(),
            RunningOperation {
                polls_remaining: script.running_polls,
                script,
                cursor: 0,
                canceled: false,
                closed: false,
            },
        );

        Ok(ExecuteStatementResp {
            status: RpcStatus::success(),
            operation_handle: Some(handle),
        })
    }

    async fn get_operation_status(
        &self,
        operation: &OperationHandle,
    ) -> Result<GetOperationStatusResp> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        match self.take_failure(calls::GET_OPERATION_STATUS)? {
            Some(MockFailure::Status(status)) => {
                return Ok(GetOperationStatusResp {
                    status,
                    operation_state: None,
                    error_message: None,
                })
            }
            Some(MockFailure::OmitPayload) => {
                return Ok(GetOperationStatusResp {
                    status: RpcStatus::success(),
                    operation_state: None,
                    error_message: None,
                })
            }
            _ => {}
        }

        let mut state = self.lock();
        let Some(op) = state.operations.get_mut(&operation.id.guid) else {
            return Ok(GetOperationStatusResp {
                status: invalid_handle(),
                operation_state: None,
                error_message: None,
            });
        };
        let current = op.state();
        if op.polls_remaining > 0 {
            op.polls_remaining -= 1;
        }
        let error_message = match current {
            OperationState::Error => op.script.error_message.clone(),
            _ => None,
        };
        Ok(GetOperationStatusResp {
            status: RpcStatus::success(),
            operation_state: Some(current),
            error_message,
        })
    }

    async fn get_result_set_metadata(
        &self,
        operation: &OperationHandle,
    ) -> Result<GetResultSetMetadataResp> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        match self.take_failure(calls::GET_RESULT_SET_METADATA)? {
            Some(MockFailure::Status(status)) => {
                return Ok(GetResultSetMetadataResp {
                    status,
                    columns: None,
                })
            }
            Some(MockFailure::OmitPayload) => {
                return Ok(GetResultSetMetadataResp {
                    status: RpcStatus::success(),
                    columns: None,
                })
            }
            _ => {}
        }

        let state = self.lock();
        let resp = match state.operations.get(&operation.id.guid) {
            Some(op) if op.state() == OperationState::Finished => GetResultSetMetadataResp {
                status: RpcStatus::success(),
                columns: Some(op.script.columns.clone()),
            },
            Some(op) => GetResultSetMetadataResp {
                status: RpcStatus::error(format!(
                    "Expected state FINISHED, but found {}",
                    op.state()
                )),
                columns: None,
            },
            None => GetResultSetMetadataResp {
                status: invalid_handle(),
                columns: None,
            },
        };
        Ok(resp)
    }

    async fn fetch_results(&self, req: FetchResultsReq) -> Result<FetchResultsResp> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.take_failure(calls::FETCH_RESULTS)? {
            Some(MockFailure::Status(status)) => {
                return Ok(FetchResultsResp {
                    status,
                    has_more_rows: None,
                    results: None,
                })
            }
            Some(MockFailure::OmitPayload) => {
                return Ok(FetchResultsResp {
                    status: RpcStatus::success(),
                    has_more_rows: None,
                    results: None,
                })
            }
            _ => {}
        }

        let mut state = self.lock();
        let Some(op) = state.operations.get_mut(&req.operation_handle.id.guid) else {
            return Ok(FetchResultsResp {
                status: invalid_handle(),
                has_more_rows: None,
                results: None,
            });
        };
        if op.state() != OperationState::Finished {
            return Ok(FetchResultsResp {
                status: RpcStatus::error(format!(
                    "Expected state FINISHED, but found {}",
                    op.state()
                )),
                has_more_rows: None,
                results: None,
            });
        }

        let take = usize::try_from(req.max_rows.max(0)).unwrap_or(usize::MAX);
        let start = op.cursor;
        let end = start.saturating_add(take).min(op.script.rows.len());
        let rows = op.script.rows[start..end].to_vec();
        op.cursor = end;

        Ok(FetchResultsResp {
            status: RpcStatus::success(),
            has_more_rows: Some(end < op.script.rows.len()),
            results: Some(RawRowSet {
                start_row_offset: start as i64,
                rows,
            }),
        })
    }

    async fn cancel_operation(&self, operation: &OperationHandle) -> Result<CancelOperationResp> {
        if let Some(MockFailure::Status(status)) = self.take_failure(calls::CANCEL_OPERATION)? {
            return Ok(CancelOperationResp { status });
        }
        let mut state = self.lock();
        let status = match state.operations.get_mut(&operation.id.guid) {
            Some(op) if op.state().is_terminal() => RpcStatus::error(format!(
                "Cannot cancel operation in state {}",
                op.state()
            )),
            Some(op) => {
                op.canceled = true;
                RpcStatus::success()
            }
            None => invalid_handle(),
        };
        Ok(CancelOperationResp { status })
    }

    async fn close_operation(&self, operation: &OperationHandle) -> Result<CloseOperationResp> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(MockFailure::Status(status)) = self.take_failure(calls::CLOSE_OPERATION)? {
            return Ok(CloseOperationResp { status });
        }
        let mut state = self.lock();
        let status = match state.operations.get_mut(&operation.id.guid) {
            Some(op) => {
                op.closed = true;
                RpcStatus::success()
            }
            None => invalid_handle(),
        };
        Ok(CloseOperationResp { status })
    }
}
