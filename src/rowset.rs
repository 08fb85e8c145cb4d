//! The public result-set orchestrator.
//!
//! A [`RowSet`] represents one asynchronous remote operation. It owns the
//! operation handle and drives the lifecycle
//!
//! ```text
//! Pending --wait--> Ready --fetch/decode--> Exhausted
//!    \                 (Ready repeats per batch)
//!     `--terminal non-success or metadata failure--> Failed
//! ```
//!
//! Nothing happens remotely until a read needs results. Reads that can't
//! make that network call (the synchronous accessors) fail with
//! `HiveError::NotReady` instead.

use crate::config::Options;
use crate::decode::decode_row;
use crate::error::{HiveError, Result};
use crate::handle;
use crate::pager::{Batch, ResultPager};
use crate::rpc::{check_status, CliService, ColumnDesc, OperationHandle, RawRow};
use crate::scan::ScanTarget;
use crate::status::{Status, StatusPoller};
use crate::value::Row;
use futures::stream::{self, Stream};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coarse lifecycle stage of a [`RowSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Submitted or reattached; the terminal status hasn't been observed.
    Pending,
    /// Finished successfully with metadata fetched; rows are being read.
    Ready,
    /// Every row has been read.
    Exhausted,
    /// The operation failed or its metadata couldn't be fetched.
    Failed,
}

#[derive(Debug)]
struct Metadata {
    columns: Vec<ColumnDesc>,
    names: Vec<String>,
}

impl Metadata {
    fn new(columns: Vec<ColumnDesc>) -> Self {
        let names = columns.iter().map(|c| c.name.clone()).collect();
        Self { columns, names }
    }
}

#[derive(Debug)]
struct Cursor {
    batch: Vec<RawRow>,
    offset: usize,
    has_more: bool,
}

impl Cursor {
    /// Before the first fetch: empty, but more may follow.
    fn initial() -> Self {
        Self {
            batch: Vec::new(),
            offset: 0,
            has_more: true,
        }
    }
}

impl From<Batch> for Cursor {
    fn from(batch: Batch) -> Self {
        Self {
            batch: batch.rows,
            offset: 0,
            has_more: batch.has_more,
        }
    }
}

#[derive(Debug)]
enum RowSetState {
    Pending,
    Ready { meta: Metadata, cursor: Cursor },
    Exhausted { meta: Metadata },
    Failed { error: HiveError },
}

/// An asynchronous remote operation and its results.
///
/// One `RowSet` must not be advanced from two tasks at once; every reading
/// method takes `&mut self`. Several `RowSet`s may share a service.
pub struct RowSet {
    handle: OperationHandle,
    options: Options,
    service: Arc<dyn CliService>,
    poller: StatusPoller,
    pager: ResultPager,
    state: RowSetState,
    terminal: Option<Status>,
    current_row: Option<Row>,
    last_error: Option<HiveError>,
    rows_read: u64,
}

impl fmt::Debug for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSet")
            .field("handle", &self.handle)
            .field("options", &self.options)
            .field("lifecycle", &self.lifecycle())
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}

impl RowSet {
    /// Creates a row set for an operation handle, fresh or reattached.
    pub fn new(service: Arc<dyn CliService>, handle: OperationHandle, options: Options) -> Self {
        Self {
            poller: StatusPoller::new(service.clone()),
            pager: ResultPager::new(service.clone(), options.batch_size),
            service,
            handle,
            options,
            state: RowSetState::Pending,
            terminal: None,
            current_row: None,
            last_error: None,
            rows_read: 0,
        }
    }

    /// Rebuilds a row set for a previously submitted operation from its
    /// serialized [`RowSet::handle`]. Nothing is re-submitted.
    pub fn reattach(
        service: Arc<dyn CliService>,
        handle_bytes: &[u8],
        options: Options,
    ) -> Result<Self> {
        let operation = handle::deserialize(handle_bytes)?;
        debug!(operation = ?operation.id, "Reattaching to operation");
        Ok(Self::new(service, operation, options))
    }

    /// Serialized, opaque form of the operation handle. Valid at any stage.
    pub fn handle(&self) -> Result<Vec<u8>> {
        handle::serialize(&self.handle)
    }

    /// The operation handle this row set owns.
    pub fn operation(&self) -> &OperationHandle {
        &self.handle
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            RowSetState::Pending => Lifecycle::Pending,
            RowSetState::Ready { .. } => Lifecycle::Ready,
            RowSetState::Exhausted { .. } => Lifecycle::Exhausted,
            RowSetState::Failed { .. } => Lifecycle::Failed,
        }
    }

    /// The terminal status observed by the wait, if it has completed.
    pub fn terminal_status(&self) -> Option<&Status> {
        self.terminal.as_ref()
    }

    /// Number of fetch round trips issued so far.
    pub fn fetch_count(&self) -> usize {
        self.pager.fetch_count()
    }

    /// Issues one status check for the operation.
    pub async fn poll(&self) -> Result<Status> {
        self.poller.poll(&self.handle).await
    }

    /// Waits until the operation is complete, fetching metadata on success.
    ///
    /// Returns the terminal status, or an error if the operation ended in a
    /// state other than FINISHED. May block forever on an operation that never
    /// ends; see [`RowSet::wait_timeout`] and [`RowSet::wait_with`].
    pub async fn wait(&mut self) -> Result<Status> {
        self.ensure_ready(None).await?;
        self.terminal.clone().ok_or(HiveError::NotReady)
    }

    /// [`RowSet::wait`] bounded by a deadline.
    ///
    /// On timeout the row set stays pending, so a later call resumes waiting.
    pub async fn wait_timeout(&mut self, limit: Duration) -> Result<Status> {
        tokio::time::timeout(limit, self.wait())
            .await
            .map_err(|_| HiveError::Timeout(limit))?
    }

    /// [`RowSet::wait`] that gives up with `HiveError::Cancelled` when
    /// `cancel` fires. The row set stays pending.
    pub async fn wait_with(&mut self, cancel: &CancellationToken) -> Result<Status> {
        self.ensure_ready(Some(cancel)).await?;
        self.terminal.clone().ok_or(HiveError::NotReady)
    }

    /// Prepares the next row for [`RowSet::current_row`] and [`RowSet::scan`].
    ///
    /// Returns false when the results are exhausted or any error occurs; once
    /// exhausted it returns false forever without further round trips. Use
    /// [`RowSet::last_error`] to tell the two apart, or [`RowSet::next_row`].
    pub async fn advance(&mut self) -> bool {
        match self.step().await {
            Ok(advanced) => advanced,
            Err(e) => {
                warn!(error = %e, "RowSet advance failed");
                false
            }
        }
    }

    /// Like [`RowSet::advance`] but keeps exhaustion (`Ok(None)`) and
    /// failure (`Err`) apart.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.step().await? {
            Ok(self.current_row.clone())
        } else {
            Ok(None)
        }
    }

    /// The error behind the most recent false from [`RowSet::advance`], cleared
    /// by the next successful advance.
    pub fn last_error(&self) -> Option<&HiveError> {
        self.last_error.as_ref()
    }

    /// The row most recently prepared by a successful advance.
    pub fn current_row(&self) -> Result<&Row> {
        self.current_row.as_ref().ok_or(HiveError::NoRow)
    }

    /// Column names, waiting for the operation first if necessary.
    pub async fn column_names(&mut self) -> Result<Vec<String>> {
        self.ensure_ready(None).await?;
        match &self.state {
            RowSetState::Ready { meta, .. } | RowSetState::Exhausted { meta } => {
                Ok(meta.names.clone())
            }
            _ => Err(HiveError::NotReady),
        }
    }

    /// Column descriptors, without any network call.
    pub fn columns(&self) -> Result<&[ColumnDesc]> {
        match &self.state {
            RowSetState::Ready { meta, .. } | RowSetState::Exhausted { meta } => {
                Ok(&meta.columns)
            }
            RowSetState::Failed { error } => Err(error.clone()),
            RowSetState::Pending => Err(HiveError::NotReady),
        }
    }

    /// Copies the current row into `dest`, positionally.
    ///
    /// Destinations are filled left to right. If a later field fails with
    /// `TypeMismatch`, the earlier destinations keep their new values.
    pub fn scan(&self, dest: &mut [&mut dyn ScanTarget]) -> Result<()> {
        let row = self.current_row()?;
        if dest.len() != row.len() {
            return Err(HiveError::Arity {
                expected: row.len(),
                actual: dest.len(),
            });
        }

        for (column, (target, value)) in dest.iter_mut().zip(row).enumerate() {
            if !target.assign(value) {
                return Err(HiveError::TypeMismatch {
                    column,
                    target: target.target_name(),
                    value: format!("{}({value})", value.type_name()),
                });
            }
        }
        Ok(())
    }

    /// Asks the server to cancel the operation.
    pub async fn cancel(&self) -> Result<()> {
        let resp = self.service.cancel_operation(&self.handle).await?;
        check_status("CancelOperation", &resp.status)?;
        info!("Cancelled operation");
        Ok(())
    }

    /// Releases the operation on the server. The row set is unusable after.
    pub async fn close(self) -> Result<()> {
        let resp = self.service.close_operation(&self.handle).await?;
        check_status("CloseOperation", &resp.status)?;
        debug!(rows_read = self.rows_read, "Closed operation");
        Ok(())
    }

    /// Adapts the row set into a stream of decoded rows.
    ///
    /// The stream ends after the last row, or right after yielding an error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + Send {
        stream::unfold((self, false), |(mut rows, failed)| async move {
            if failed {
                return None;
            }
            match rows.next_row().await {
                Ok(Some(row)) => Some((Ok(row), (rows, false))),
                Ok(None) => None,
                Err(e) => Some((Err(e), (rows, true))),
            }
        })
    }

    /// One advance, recording the outcome in `last_error`.
    async fn step(&mut self) -> Result<bool> {
        let result = self.try_step().await;
        self.last_error = result.as_ref().err().cloned();
        result
    }

    async fn try_step(&mut self) -> Result<bool> {
        self.ensure_ready(None).await?;

        loop {
            let (meta, cursor) = match &mut self.state {
                RowSetState::Ready { meta, cursor } => (meta, cursor),
                RowSetState::Exhausted { .. } => return Ok(false),
                RowSetState::Pending | RowSetState::Failed { .. } => {
                    return Err(HiveError::NotReady)
                }
            };

            if let Some(raw) = cursor.batch.get(cursor.offset) {
                // The row is consumed even if it fails to decode.
                cursor.offset += 1;
                let row = decode_row(raw, meta.columns.len())?;
                self.current_row = Some(row);
                self.rows_read += 1;
                return Ok(true);
            }

            if !cursor.has_more {
                self.finish();
                return Ok(false);
            }

            let batch = self.pager.fetch_next_batch(&self.handle).await?;
            *cursor = Cursor::from(batch);
        }
    }

    /// Moves Ready to Exhausted, keeping the metadata.
    fn finish(&mut self) {
        let state = std::mem::replace(&mut self.state, RowSetState::Pending);
        self.state = match state {
            RowSetState::Ready { meta, .. } => {
                info!(
                    rows = self.rows_read,
                    fetches = self.pager.fetch_count(),
                    "Result set exhausted"
                );
                RowSetState::Exhausted { meta }
            }
            other => other,
        };
    }

    /// Pending -> Ready (or Failed). Idempotent once the wait has settled.
    ///
    /// Poll errors, timeouts and cancellation leave the row set pending.
    /// A terminal non-success status, or a metadata failure after success,
    /// settles it as Failed for good.
    async fn ensure_ready(&mut self, cancel: Option<&CancellationToken>) -> Result<()> {
        match &self.state {
            RowSetState::Pending => {}
            RowSetState::Failed { error } => return Err(error.clone()),
            RowSetState::Ready { .. } | RowSetState::Exhausted { .. } => return Ok(()),
        }

        let interval = self.options.poll_interval;
        let status = match cancel {
            Some(token) => {
                self.poller
                    .wait_until_terminal_with(&self.handle, interval, token)
                    .await?
            }
            None => self.poller.wait_until_terminal(&self.handle, interval).await?,
        };

        let outcome = self.fetch_metadata(&status).await;
        self.terminal = Some(status);
        match outcome {
            Ok(meta) => {
                info!(columns = meta.columns.len(), "Operation finished");
                self.state = RowSetState::Ready {
                    meta,
                    cursor: Cursor::initial(),
                };
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "Operation did not succeed");
                self.state = RowSetState::Failed {
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    async fn fetch_metadata(&self, status: &Status) -> Result<Metadata> {
        if !status.is_success() {
            return Err(HiveError::OperationFailed {
                state: status.to_string(),
                message: status.error().map(String::from),
            });
        }

        let resp = self.service.get_result_set_metadata(&self.handle).await?;
        check_status("GetResultSetMetadata", &resp.status)?;
        let columns = resp.columns.ok_or_else(|| {
            HiveError::protocol("GetResultSetMetadata response is missing the schema")
        })?;
        debug!(columns = columns.len(), "Fetched result set metadata");
        Ok(Metadata::new(columns))
    }
}
