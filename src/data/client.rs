//! Shared HTTP client for every upstream adapter.
//!
//! Wraps `reqwest` with a global token-bucket rate limiter, an explicit
//! per-call timeout and bounded exponential backoff for transient failures.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::{RateLimitConfig, SourcesConfig};
use crate::error::UpstreamError;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    limiter: Arc<Limiter>,
    timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_max_ms: u64,
}

impl UpstreamClient {
    pub fn new(sources: &SourcesConfig, rate_limit: &RateLimitConfig) -> Result<Self> {
        let timeout = Duration::from_secs(sources.request_timeout_seconds);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("sports-aggregator/0.1")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            limiter: create_rate_limiter(rate_limit),
            timeout,
            max_retries: sources.max_retries,
            backoff_base_ms: rate_limit.backoff_base_ms,
            backoff_max_ms: rate_limit.backoff_max_ms,
        })
    }

    /// GET a JSON document and decode it into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let body = self.get_text(url, query).await?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET a body as text, retrying transient failures.
    #[instrument(skip(self, query), fields(url = %url))]
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, UpstreamError> {
        let mut attempt = 0u32;

        loop {
            match self.send_once(url, query).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() || attempt > self.max_retries {
                        debug!(attempt, error = %e, "Upstream call failed");
                        return Err(e);
                    }

                    let backoff_ms = std::cmp::min(
                        self.backoff_base_ms.saturating_mul(2u64.pow(attempt - 1)),
                        self.backoff_max_ms,
                    );

                    warn!(
                        attempt,
                        backoff_ms,
                        error = %e,
                        "Retrying after transient upstream failure"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn send_once(&self, url: &str, query: &[(&str, String)]) -> Result<String, UpstreamError> {
        self.limiter.until_ready().await;

        let request = async {
            let response = self
                .http
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| transport_error(url, e, self.timeout))?;

            let status = response.status();
            if !status.is_success() {
                return Err(UpstreamError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            response
                .text()
                .await
                .map_err(|e| transport_error(url, e, self.timeout))
        };

        // Covers the body read as well as the connect/headers phase.
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

fn transport_error(url: &str, e: reqwest::Error, timeout: Duration) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout {
            url: url.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        UpstreamError::Transport {
            url: url.to_string(),
            source: e,
        }
    }
}

fn create_rate_limiter(config: &RateLimitConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}
