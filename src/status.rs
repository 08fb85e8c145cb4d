//! Operation status polling.
//!
//! A [`Status`] is a point-in-time reading of a remote operation's state.
//! [`StatusPoller`] issues single status checks and runs the fixed-interval
//! wait loop until the operation reaches a terminal state.

use crate::error::{HiveError, Result};
use crate::rpc::{check_status, CliService, OperationHandle, OperationState};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Job status, including success state and the time it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    state: Option<OperationState>,
    error: Option<String>,
    at: SystemTime,
}

impl Status {
    /// Creates a status observed now.
    pub fn new(state: Option<OperationState>, error: Option<String>) -> Self {
        Self {
            state,
            error,
            at: SystemTime::now(),
        }
    }

    /// The reported state, if the server sent one.
    pub fn state(&self) -> Option<OperationState> {
        self.state
    }

    /// Error text the server attached to the status, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When this status was observed.
    pub fn at(&self) -> SystemTime {
        self.at
    }

    /// Returns true if the job has completed or failed.
    pub fn is_complete(&self) -> bool {
        self.state.is_some_and(|s| s.is_terminal())
    }

    /// Returns true if the job completed successfully.
    pub fn is_success(&self) -> bool {
        self.state == Some(OperationState::Finished)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            Some(state) => write!(f, "{state}"),
            None => f.write_str("unknown"),
        }
    }
}

/// Issues status checks for operations on one service.
#[derive(Clone)]
pub struct StatusPoller {
    service: Arc<dyn CliService>,
}

impl StatusPoller {
    pub fn new(service: Arc<dyn CliService>) -> Self {
        Self { service }
    }

    /// One status round trip.
    pub async fn poll(&self, handle: &OperationHandle) -> Result<Status> {
        let resp = self.service.get_operation_status(handle).await?;
        check_status("GetOperationStatus", &resp.status)?;

        let Some(state) = resp.operation_state else {
            return Err(HiveError::protocol(
                "No error from GetOperationStatus, but no status either",
            ));
        };
        debug!(state = %state, "Polled operation status");
        Ok(Status::new(Some(state), resp.error_message))
    }

    /// Polls every `interval` until the operation is complete.
    ///
    /// There is no deadline: an operation that never finishes blocks the
    /// caller forever. Use [`StatusPoller::wait_until_terminal_with`] or a
    /// timeout around this future to bound it.
    pub async fn wait_until_terminal(
        &self,
        handle: &OperationHandle,
        interval: Duration,
    ) -> Result<Status> {
        loop {
            let status = self.poll(handle).await?;
            if status.is_complete() {
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Like [`StatusPoller::wait_until_terminal`], but stops with
    /// `HiveError::Cancelled` as soon as `cancel` fires.
    pub async fn wait_until_terminal_with(
        &self,
        handle: &OperationHandle,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Status> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HiveError::Cancelled),
            result = self.wait_until_terminal(handle, interval) => result,
        }
    }
}
