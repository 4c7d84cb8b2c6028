use thiserror::Error;

/// A single upstream call failed. Always absorbed at the adapter boundary.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl UpstreamError {
    /// Server-side failures and timeouts are worth one more attempt; 4xx are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode { .. } => false,
        }
    }
}

/// Feed-level conditions. Logged, never returned to callers: the fallback
/// chain turns them into placeholder content.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("all {stages} stages of the {chain} chain produced no records")]
    AllSourcesExhausted { chain: String, stages: usize },

    /// Every sub-call of one source failed; the chain advances past it.
    #[error("all {calls} upstream calls of {name} failed")]
    SourceDown { name: String, calls: usize },
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("enrichment provider {provider} returned malformed output: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("enrichment provider {provider} altered factual tokens: missing {missing:?}")]
    FactsAltered {
        provider: String,
        missing: Vec<String>,
    },
}

/// User-visible failures of `submit_prediction`.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("user {user_id} already predicted poll {poll_id}")]
    DuplicatePrediction { user_id: i64, poll_id: i64 },

    #[error("poll {0} not found")]
    PollNotFound(i64),

    #[error("poll {0} is closed")]
    PollClosed(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
