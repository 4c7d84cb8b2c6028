pub mod classify;
pub mod client;
pub mod news;
pub mod rosters;
pub mod rss;
pub mod scores;

use std::fmt;
use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::{FeedError, UpstreamError};

pub use client::UpstreamClient;

/// Trait for all upstream sources and fallback stages.
///
/// A source absorbs failures of its own sub-requests and returns whatever
/// it could collect; an `Err` means the source as a whole could not run.
#[async_trait]
pub trait DataSource: Send + Sync {
    type Query: Send + Sync;
    type Record: Send;

    /// Fetch and normalize records for the query.
    async fn fetch(&self, query: &Self::Query) -> Result<Vec<Self::Record>>;

    /// Human-readable name of this data source.
    fn name(&self) -> &str;
}

/// Outcome of one concurrent batch of upstream calls.
#[derive(Debug)]
pub struct FanOut<T, L = String> {
    pub records: Vec<T>,
    pub succeeded: usize,
    /// Labels of the calls that failed, in call order.
    pub failed: Vec<L>,
}

impl<T, L> FanOut<T, L> {
    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && !self.failed.is_empty()
    }

    /// The collected records, or an error when not a single call succeeded.
    pub fn into_records(self, source: &str) -> Result<Vec<T>> {
        if self.all_failed() {
            return Err(FeedError::SourceDown {
                name: source.to_string(),
                calls: self.failed.len(),
            }
            .into());
        }
        Ok(self.records)
    }
}

/// Run every labelled call concurrently and wait for all of them to settle.
///
/// Failed calls are logged and contribute nothing; successful results are
/// flattened in call order. Latency is that of the slowest call.
pub async fn fan_out<T, L, F>(source: &str, calls: Vec<(L, F)>) -> FanOut<T, L>
where
    L: fmt::Display,
    F: Future<Output = Result<Vec<T>, UpstreamError>>,
{
    let settled = join_all(
        calls
            .into_iter()
            .map(|(label, call)| async move { (label, call.await) }),
    )
    .await;

    let mut records = Vec::new();
    let mut succeeded = 0;
    let mut failed = Vec::new();

    for (label, result) in settled {
        match result {
            Ok(batch) => {
                debug!(source, call = %label, records = batch.len(), "Upstream call settled");
                succeeded += 1;
                records.extend(batch);
            }
            Err(e) => {
                warn!(source, call = %label, error = %e, "Upstream call failed, skipping");
                failed.push(label);
            }
        }
    }

    FanOut {
        records,
        succeeded,
        failed,
    }
}
