//! AI enrichment pass.
//!
//! Asks a generative model to improve article prose, summary and tags
//! without touching facts. Providers are tried in order (primary, backup);
//! when all fail the article gets a deterministic rewrite instead. An
//! article is never dropped because enrichment failed.
//!
//! The same providers also write game previews; see [`previews`].

pub mod gemini;
pub mod json;
pub mod openai;
pub mod previews;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::{EnrichmentConfig, Secrets};
use crate::error::EnrichError;
use crate::feed::models::{NormalizedArticle, NormalizedEvent};

use self::json::{parse_enhanced, truncate, EnhancedArticle};
use self::previews::{basic_previews, build_preview_prompt, parse_previews, GamePreview};

const SUMMARY_MAX_CHARS: usize = 150;
const MAX_TAGS: usize = 4;

/// Title words that become tags when no model is available.
const FALLBACK_TAG_TERMS: &[&str] = &[
    "trade", "injury", "championship", "playoff", "draft", "signing", "victory", "defeat",
];
const DEFAULT_TAGS: &[&str] = &["sports", "news"];

/// A generative text service: prompt in, free text (expected JSON) out.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, EnrichError>;
}

pub struct Enricher {
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    max_articles: usize,
}

impl Enricher {
    pub fn new(providers: Vec<Arc<dyn EnrichmentProvider>>, max_articles: usize) -> Self {
        Self {
            providers,
            max_articles,
        }
    }

    /// Gemini as primary, OpenAI as backup, each only when its key is set.
    /// `None` when enrichment is disabled or no provider is configured.
    pub fn from_config(config: &EnrichmentConfig, secrets: &Secrets) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let mut providers: Vec<Arc<dyn EnrichmentProvider>> = Vec::new();
        if let Some(key) = &secrets.gemini_api_key {
            providers.push(Arc::new(gemini::GeminiClient::new(
                &config.gemini_base_url,
                &config.gemini_model,
                key.clone(),
                config.request_timeout_seconds,
            )?));
        }
        if let Some(key) = &secrets.openai_api_key {
            providers.push(Arc::new(openai::OpenAiClient::new(
                &config.openai_base_url,
                &config.openai_model,
                key.clone(),
                config.request_timeout_seconds,
            )?));
        }

        if providers.is_empty() {
            info!("No enrichment provider configured, articles served as normalized");
            return Ok(None);
        }

        info!(
            providers = ?providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
            "Enrichment enabled"
        );
        Ok(Some(Self::new(providers, config.max_articles)))
    }

    /// Enrich the first `max_articles` real articles concurrently; the rest
    /// and any placeholders pass through untouched. Order is preserved.
    pub async fn enrich_batch(&self, articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
        let mut budget = self.max_articles;
        let tasks = articles.into_iter().map(|article| {
            let eligible = !article.placeholder && budget > 0;
            if eligible {
                budget -= 1;
            }
            async move {
                if eligible {
                    self.enrich_one(article).await
                } else {
                    article
                }
            }
        });

        join_all(tasks).await
    }

    /// Previews for `games` from the first provider with a usable answer,
    /// else from the scoreboard alone.
    pub async fn preview_games(&self, games: &[NormalizedEvent], now: DateTime<Utc>) -> Vec<GamePreview> {
        let prompt = build_preview_prompt(games);
        for provider in &self.providers {
            let attempt = match provider.complete(&prompt).await {
                Ok(text) => parse_previews(&text, games, provider.name(), now),
                Err(e) => Err(e.to_string()),
            };
            match attempt {
                Ok(previews) => {
                    info!(provider = provider.name(), previews = previews.len(), "Game previews generated");
                    return previews;
                }
                Err(reason) => warn!(provider = provider.name(), %reason, "Game previews failed"),
            }
        }

        basic_previews(games, now)
    }

    async fn enrich_one(&self, article: NormalizedArticle) -> NormalizedArticle {
        for provider in &self.providers {
            match self.try_provider(provider.as_ref(), &article).await {
                Ok(enhanced) => {
                    debug!(provider = provider.name(), title = %enhanced.title, "Article enriched");
                    return enhanced;
                }
                Err(e) => {
                    warn!(provider = provider.name(), title = %article.title, error = %e, "Enrichment failed");
                }
            }
        }

        deterministic_rewrite(article)
    }

    async fn try_provider(
        &self,
        provider: &dyn EnrichmentProvider,
        article: &NormalizedArticle,
    ) -> Result<NormalizedArticle, EnrichError> {
        let text = provider.complete(&build_prompt(article)).await?;

        let enhanced = parse_enhanced(&text).map_err(|reason| EnrichError::MalformedResponse {
            provider: provider.name().to_string(),
            reason,
        })?;

        let missing = missing_facts(&article.title, &enhanced);
        if !missing.is_empty() {
            return Err(EnrichError::FactsAltered {
                provider: provider.name().to_string(),
                missing,
            });
        }

        Ok(apply_enhancement(article.clone(), enhanced))
    }
}

fn build_prompt(article: &NormalizedArticle) -> String {
    format!(
        "You are editing a real sports news story. Every fact in it actually happened.\n\
         \n\
         Title: {title}\n\
         Content: {content}\n\
         Source: {source}\n\
         Published: {published}\n\
         Category: {category}\n\
         \n\
         Rules:\n\
         - Keep every name, number, score, date and team exactly as written.\n\
         - Do not add facts, statistics or quotes.\n\
         - Improve readability and structure; expand short content to two or three paragraphs.\n\
         - Write a one or two sentence factual summary.\n\
         - Suggest up to four short tags.\n\
         \n\
         Reply with only this JSON object:\n\
         {{\"title\": \"...\", \"content\": \"...\", \"summary\": \"...\", \"tags\": [\"...\"]}}",
        title = article.title,
        content = article.content,
        source = article.source,
        published = article.published_at.to_rfc3339(),
        category = article.category,
    )
}

/// Numeric tokens of the original title absent from the rewritten title and content.
fn missing_facts(original_title: &str, enhanced: &EnhancedArticle) -> Vec<String> {
    let rewritten = format!("{} {}", enhanced.title, enhanced.content);
    let present = numeric_tokens(&rewritten);

    numeric_tokens(original_title)
        .into_iter()
        .filter(|token| !present.contains(token))
        .collect()
}

fn numeric_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_enhancement(mut article: NormalizedArticle, enhanced: EnhancedArticle) -> NormalizedArticle {
    article.title = enhanced.title.trim().to_string();
    article.content = enhanced.content.trim().to_string();
    if !enhanced.summary.trim().is_empty() {
        article.summary = enhanced.summary.trim().to_string();
    }

    let tags: Vec<String> = enhanced
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect();
    if !tags.is_empty() {
        article.tags = tags;
    }
    article
}

/// Non-AI fallback: truncated content as summary, keyword tags.
pub fn deterministic_rewrite(mut article: NormalizedArticle) -> NormalizedArticle {
    if !article.content.trim().is_empty() {
        article.summary = truncate(article.content.trim(), SUMMARY_MAX_CHARS);
    }

    if article.tags.is_empty() {
        let title = article.title.to_lowercase();
        let tags: Vec<String> = FALLBACK_TAG_TERMS
            .iter()
            .filter(|term| title.contains(*term))
            .map(|term| term.to_string())
            .collect();
        article.tags = if tags.is_empty() {
            DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
        } else {
            tags
        };
    }
    article
}
