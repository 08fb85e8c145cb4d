//! Session lifecycle and statement submission.

use crate::config::{ConnectionConfig, Options};
use crate::error::{HiveError, Result};
use crate::rowset::RowSet;
use crate::rpc::{
    check_status, CliService, ExecuteStatementReq, OpenSessionReq, OperationHandle,
    SessionHandle, CLIENT_PROTOCOL_VERSION,
};
use crate::status::{Status, StatusPoller};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An open session on a CLI service.
///
/// Every [`RowSet`] obtained from a connection shares its service. Closing
/// the connection doesn't close operations that are still held by row sets.
pub struct Connection {
    service: Arc<dyn CliService>,
    session: Option<SessionHandle>,
    options: Options,
    target: String,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a session, switching to `config.database` if one is set.
    pub async fn open(
        service: Arc<dyn CliService>,
        config: &ConnectionConfig,
        options: Options,
    ) -> Result<Self> {
        options.validate()?;

        let resp = service
            .open_session(OpenSessionReq {
                client_protocol: CLIENT_PROTOCOL_VERSION,
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;
        check_status("OpenSession", &resp.status)?;
        let session = resp
            .session_handle
            .ok_or_else(|| HiveError::protocol("OpenSession response is missing the session handle"))?;

        let target = config.display_string();
        info!(
            target_db = %target,
            server_protocol = resp.server_protocol,
            "Opened session"
        );

        let conn = Self {
            service,
            session: Some(session),
            options,
            target,
        };

        if let Some(database) = config.database.as_deref().filter(|d| !d.is_empty()) {
            if let Err(e) = conn.exec(&format!("USE {database}")).await {
                conn.abandon().await;
                return Err(e);
            }
        }
        Ok(conn)
    }

    /// Submits a statement asynchronously and returns its pending row set.
    pub async fn query(&self, statement: &str) -> Result<RowSet> {
        let handle = self.submit(statement).await?;
        Ok(RowSet::new(self.service.clone(), handle, self.options))
    }

    /// Submits a statement and waits for it to finish, without fetching rows.
    ///
    /// Meant for DDL and DML. The operation is closed afterwards, also when
    /// the wait fails.
    pub async fn exec(&self, statement: &str) -> Result<Status> {
        let handle = self.submit(statement).await?;
        let waited = StatusPoller::new(self.service.clone())
            .wait_until_terminal(&handle, self.options.poll_interval)
            .await;

        if let Err(e) = self.release(&handle).await {
            warn!(error = %e, "Failed to close operation");
        }

        let status = waited?;
        if !status.is_success() {
            return Err(HiveError::OperationFailed {
                state: status.to_string(),
                message: status.error().map(String::from),
            });
        }
        Ok(status)
    }

    /// Rebuilds a row set from a serialized handle. Nothing is re-submitted.
    pub fn reattach(&self, handle: &[u8]) -> Result<RowSet> {
        RowSet::reattach(self.service.clone(), handle, self.options)
    }

    /// Closes the session. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let resp = self.service.close_session(&session).await?;
        check_status("CloseSession", &resp.status)?;
        info!(target_db = %self.target, "Closed session");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Human-readable form of the connection target, without the password.
    pub fn target(&self) -> &str {
        &self.target
    }

    async fn submit(&self, statement: &str) -> Result<OperationHandle> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| HiveError::connection("Session is closed"))?;

        let resp = self
            .service
            .execute_statement(ExecuteStatementReq {
                session_handle: session.clone(),
                statement: statement.to_string(),
                run_async: true,
            })
            .await?;
        check_status("ExecuteStatement", &resp.status)?;
        let handle = resp.operation_handle.ok_or_else(|| {
            HiveError::protocol("ExecuteStatement response is missing the operation handle")
        })?;
        debug!(has_result_set = handle.has_result_set, "Submitted statement");
        Ok(handle)
    }

    /// Closes the session after a failed open, keeping the original error.
    async fn abandon(mut self) {
        if let Err(e) = self.close().await {
            warn!(error = %e, "Failed to close session after failed open");
        }
    }

    async fn release(&self, handle: &OperationHandle) -> Result<()> {
        let resp = self.service.close_operation(handle).await?;
        check_status("CloseOperation", &resp.status)
    }
}
