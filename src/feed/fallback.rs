//! Ordered degradation across sources.
//!
//! Stages are tried primary-first on every call; the chain carries no
//! "degraded" state between calls. A stage is skipped when it errors or
//! yields nothing usable, and the terminal placeholder always yields at
//! least one record.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::DataSource;
use crate::error::FeedError;

pub type Stage<Q, R> = Arc<dyn DataSource<Query = Q, Record = R>>;

/// Name reported when the terminal placeholder served the call.
pub const PLACEHOLDER_STAGE: &str = "placeholder";

#[derive(Debug)]
pub struct FallbackOutcome<R> {
    pub records: Vec<R>,
    /// Name of the stage that produced `records`.
    pub stage: String,
}

impl<R> FallbackOutcome<R> {
    pub fn is_placeholder(&self) -> bool {
        self.stage == PLACEHOLDER_STAGE
    }
}

pub struct FallbackChain<Q, R> {
    name: String,
    stages: Vec<Stage<Q, R>>,
    placeholder: Arc<dyn Fn() -> Vec<R> + Send + Sync>,
}

impl<Q, R> FallbackChain<Q, R>
where
    Q: Send + Sync + 'static,
    R: Send + 'static,
{
    pub fn new(
        name: &str,
        stages: Vec<Stage<Q, R>>,
        placeholder: impl Fn() -> Vec<R> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            stages,
            placeholder: Arc::new(placeholder),
        }
    }

    /// Evaluate the chain. `usable` filters each stage's output before the
    /// empty check, so a stage with records but none matching advances too.
    pub async fn run(&self, query: &Q, usable: impl Fn(&R) -> bool + Send + Sync) -> FallbackOutcome<R> {
        for stage in &self.stages {
            match stage.fetch(query).await {
                Ok(records) => {
                    let fetched = records.len();
                    let records: Vec<R> = records.into_iter().filter(|r| usable(r)).collect();
                    if !records.is_empty() {
                        debug!(
                            chain = %self.name,
                            stage = stage.name(),
                            records = records.len(),
                            "Fallback stage served"
                        );
                        return FallbackOutcome {
                            records,
                            stage: stage.name().to_string(),
                        };
                    }
                    warn!(
                        chain = %self.name,
                        stage = stage.name(),
                        fetched,
                        "Stage yielded no usable records, advancing"
                    );
                }
                Err(e) => {
                    warn!(
                        chain = %self.name,
                        stage = stage.name(),
                        error = %e,
                        "Stage failed, advancing"
                    );
                }
            }
        }

        let exhausted = FeedError::AllSourcesExhausted {
            chain: self.name.clone(),
            stages: self.stages.len(),
        };
        warn!(error = %exhausted, "Serving placeholder content");

        FallbackOutcome {
            records: (self.placeholder)(),
            stage: PLACEHOLDER_STAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        records: Option<Vec<u32>>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, records: Option<Vec<u32>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                records,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DataSource for Fixed {
        type Query = ();
        type Record = u32;

        async fn fetch(&self, _query: &()) -> Result<Vec<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.records {
                Some(records) => Ok(records.clone()),
                None => bail!("{} is down", self.name),
            }
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn chain(stages: Vec<Arc<Fixed>>) -> FallbackChain<(), u32> {
        let stages = stages
            .into_iter()
            .map(|s| s as Stage<(), u32>)
            .collect();
        FallbackChain::new("test", stages, || vec![0])
    }

    #[tokio::test]
    async fn test_primary_serves_when_non_empty() {
        let primary = Fixed::new("primary", Some(vec![1, 2]));
        let secondary = Fixed::new("secondary", Some(vec![9]));
        let outcome = chain(vec![primary.clone(), secondary.clone()]).run(&(), |_| true).await;

        assert_eq!(outcome.records, vec![1, 2]);
        assert_eq!(outcome.stage, "primary");
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_advances_on_error_and_on_empty() {
        let failing = Fixed::new("failing", None);
        let empty = Fixed::new("empty", Some(vec![]));
        let backup = Fixed::new("backup", Some(vec![7]));
        let outcome = chain(vec![failing, empty, backup]).run(&(), |_| true).await;

        assert_eq!(outcome.records, vec![7]);
        assert_eq!(outcome.stage, "backup");
    }

    #[tokio::test]
    async fn test_unusable_records_advance() {
        let primary = Fixed::new("primary", Some(vec![1, 3]));
        let secondary = Fixed::new("secondary", Some(vec![2, 4, 5]));
        let outcome = chain(vec![primary, secondary]).run(&(), |n| n % 2 == 0).await;

        assert_eq!(outcome.records, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_exhausted_chain_yields_placeholder() {
        let outcome = chain(vec![Fixed::new("a", None), Fixed::new("b", Some(vec![]))])
            .run(&(), |_| true)
            .await;

        assert!(outcome.is_placeholder());
        assert_eq!(outcome.records, vec![0]);
    }

    #[tokio::test]
    async fn test_each_call_starts_from_primary() {
        let primary = Fixed::new("primary", None);
        let backup = Fixed::new("backup", Some(vec![1]));
        let chain = chain(vec![primary.clone(), backup]);

        chain.run(&(), |_| true).await;
        chain.run(&(), |_| true).await;
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    }
}
