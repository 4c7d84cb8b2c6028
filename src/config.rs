use std::path::Path;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub sources: SourcesConfig,
    pub rate_limit: RateLimitConfig,
    pub feed: FeedConfig,
    pub polls: PollsConfig,
    pub enrichment: EnrichmentConfig,
    pub monitoring: MonitoringConfig,
    pub database: DatabaseConfig,
}

/// Refresh timers and the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub scores_interval_seconds: u64,
    pub news_interval_seconds: u64,
    pub polls_interval_seconds: u64,
    pub health_bind: String,
    pub health_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// e.g. https://site.api.espn.com/apis/site/v2/sports
    pub espn_site_base_url: String,
    /// Aggregate news endpoint, e.g. https://site.api.espn.com/apis/v2/sports/news
    pub espn_news_url: String,
    pub espn_rss_url: String,
    pub news_api_base_url: String,
    pub news_api_domains: Vec<String>,
    pub news_queries: Vec<String>,
    pub request_timeout_seconds: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub max_events: usize,
    pub max_articles: usize,
    /// Sport codes queried when the caller gives no filter.
    pub default_sports: Vec<String>,
    /// Sport codes whose league news feeds are pulled alongside the aggregate feed.
    pub news_sports: Vec<String>,
    /// How long the last good scoreboard result may stand in for a failed fetch.
    pub snapshot_max_age_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollsConfig {
    pub reward_points: i64,
    /// Poll expiry = scheduled start + this many hours.
    pub grace_hours: i64,
    /// Poll expiry when the start time is unknown = now + this many hours.
    pub unknown_start_window_hours: i64,
    pub max_polls_per_cycle: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub max_articles: usize,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub news_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            news_api_key: secret_var("NEWS_API_KEY"),
            gemini_api_key: secret_var("GEMINI_API_KEY"),
            openai_api_key: secret_var("OPENAI_API_KEY"),
        }
    }

    pub fn none() -> Self {
        Self {
            news_api_key: None,
            gemini_api_key: None,
            openai_api_key: None,
        }
    }
}

fn secret_var(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables for secrets.
    pub fn load(path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let contents = std::fs::read_to_string(DEFAULT_CONFIG_PATH)
            .expect("config/default.toml should exist");
        let config: AppConfig = toml::from_str(&contents).expect("should parse");
        assert_eq!(config.service.scores_interval_seconds, 30);
        assert_eq!(config.feed.max_events, 10);
        assert_eq!(config.polls.reward_points, 100);
        assert_eq!(config.polls.grace_hours, 3);
        assert!(config.feed.default_sports.contains(&"nba".to_string()));
        assert!(config.sources.request_timeout_seconds >= 5);
        assert!(config.sources.request_timeout_seconds <= 15);
    }

    #[test]
    fn test_database_url() {
        let db = DatabaseConfig {
            path: "test.db".to_string(),
        };
        assert_eq!(db.url(), "sqlite:test.db");
    }
}
