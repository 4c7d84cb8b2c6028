//! Last successful primary result, served as an intermediate fallback stage.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::data::DataSource;

struct Snapshot<R> {
    taken_at: DateTime<Utc>,
    records: Vec<R>,
}

/// Holds the last non-empty primary result for up to `max_age`.
pub struct LastGoodSnapshot<Q, R> {
    name: String,
    max_age: Duration,
    inner: Arc<RwLock<Option<Snapshot<R>>>>,
    _query: PhantomData<fn(&Q)>,
}

impl<Q, R: Clone> LastGoodSnapshot<Q, R> {
    pub fn new(name: &str, max_age_seconds: i64) -> Self {
        Self {
            name: name.to_string(),
            max_age: Duration::seconds(max_age_seconds),
            inner: Arc::new(RwLock::new(None)),
            _query: PhantomData,
        }
    }

    /// Replace the snapshot. Empty results never overwrite a good one.
    pub async fn store(&self, records: &[R], now: DateTime<Utc>) {
        if records.is_empty() {
            return;
        }
        *self.inner.write().await = Some(Snapshot {
            taken_at: now,
            records: records.to_vec(),
        });
    }

    /// Records if the snapshot is still fresh at `now`.
    pub async fn fresh(&self, now: DateTime<Utc>) -> Vec<R> {
        let guard = self.inner.read().await;
        match guard.as_ref() {
            Some(snapshot) if now - snapshot.taken_at <= self.max_age => snapshot.records.clone(),
            Some(snapshot) => {
                debug!(
                    stage = %self.name,
                    age_seconds = (now - snapshot.taken_at).num_seconds(),
                    "Snapshot too old to serve"
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl<Q, R> DataSource for LastGoodSnapshot<Q, R>
where
    Q: Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    type Query = Q;
    type Record = R;

    async fn fetch(&self, _query: &Q) -> Result<Vec<R>> {
        Ok(self.fresh(Utc::now()).await)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
