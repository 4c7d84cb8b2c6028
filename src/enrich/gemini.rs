//! Gemini generateContent client, the primary enrichment provider.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::enrich::EnrichmentProvider;
use crate::error::EnrichError;

const PROVIDER: &str = "gemini";

pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: SecretString, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build Gemini HTTP client")?;

        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            urlencoding::encode(model)
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.to_string(),
        })
    }

    fn unavailable(reason: impl ToString) -> EnrichError {
        EnrichError::Unavailable {
            provider: PROVIDER.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl EnrichmentProvider for GeminiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, EnrichError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.expose_secret())])
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::unavailable(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(format!("HTTP {status}: {error_body}")));
        }

        let api_response: GeminiResponse = response.json().await.map_err(|e| EnrichError::MalformedResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let text = api_response
            .candidates
            .iter()
            .flat_map(|c| c.content.parts.iter())
            .map(|p| p.text.as_str())
            .collect::<Vec<&str>>()
            .join("");

        if let Some(usage) = &api_response.usage_metadata {
            info!(
                input_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                model = %self.model,
                "Gemini call completed"
            );
        }

        if text.trim().is_empty() {
            return Err(EnrichError::MalformedResponse {
                provider: PROVIDER.to_string(),
                reason: "no candidate text".to_string(),
            });
        }
        Ok(text)
    }
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}
