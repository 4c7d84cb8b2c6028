//! OpenAI chat completions client, the backup enrichment provider.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::enrich::EnrichmentProvider;
use crate::error::EnrichError;

const PROVIDER: &str = "openai";

const SYSTEM_PROMPT: &str = "You are a professional sports journalist. Improve readability \
    while preserving every fact exactly. Always answer with a single JSON object.";

pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, model: &str, api_key: SecretString, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build OpenAI HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EnrichmentProvider for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, EnrichError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.3,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| EnrichError::Unavailable {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Unavailable {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {error_body}"),
            });
        }

        let api_response: ChatResponse = response.json().await.map_err(|e| EnrichError::MalformedResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(usage) = &api_response.usage {
            info!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                model = %self.model,
                "OpenAI call completed"
            );
        }

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| EnrichError::MalformedResponse {
                provider: PROVIDER.to_string(),
                reason: "no choice content".to_string(),
            })
    }
}

// --- Request/Response Types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}
