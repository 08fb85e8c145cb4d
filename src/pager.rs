//! Paged result fetching.
//!
//! Pulls successive batches of raw rows for a finished operation. The server's
//! `has_more_rows` flag is the only signal for whether another fetch can
//! yield rows.

use crate::error::{HiveError, Result};
use crate::rpc::{check_status, CliService, FetchOrientation, FetchResultsReq, OperationHandle, RawRow};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One page of raw rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub rows: Vec<RawRow>,
    pub has_more: bool,
}

/// Fetches batches for operations on one service.
pub struct ResultPager {
    service: Arc<dyn CliService>,
    batch_size: i64,
    fetches: AtomicUsize,
}

impl ResultPager {
    /// `batch_size` bounds, but does not guarantee, the rows per fetch.
    pub fn new(service: Arc<dyn CliService>, batch_size: i64) -> Self {
        Self {
            service,
            batch_size,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetch round trips issued so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// One FETCH_NEXT round trip.
    pub async fn fetch_next_batch(&self, handle: &OperationHandle) -> Result<Batch> {
        let n = self.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        let resp = self
            .service
            .fetch_results(FetchResultsReq {
                operation_handle: handle.clone(),
                orientation: FetchOrientation::Next,
                max_rows: self.batch_size,
            })
            .await?;
        check_status("FetchResults", &resp.status)?;

        let has_more = resp
            .has_more_rows
            .ok_or_else(|| HiveError::protocol("FetchResults response is missing hasMoreRows"))?;
        let results = resp
            .results
            .ok_or_else(|| HiveError::protocol("FetchResults response is missing results"))?;

        debug!(
            fetch = n,
            max_rows = self.batch_size,
            rows = results.rows.len(),
            has_more,
            "Fetched result batch"
        );
        Ok(Batch {
            rows: results.rows,
            has_more,
        })
    }
}
