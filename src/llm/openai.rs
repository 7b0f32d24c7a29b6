//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::errors::{MemoryError, Result};
use crate::llm::CompletionService;
use crate::types::Message;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

pub struct OpenAiChatClient {
    base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
    http_client: Client,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: Option<String>,
        model: String,
        temperature: f32,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemoryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            temperature,
            api_key,
            http_client,
        })
    }

    /// Build from config; the key is read from the configured env var
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            warn!(env = %config.api_key_env, "No API key found for OpenAI client");
        }
        Self::new(
            Some(config.base_url.clone()),
            config.model.clone(),
            config.temperature,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn build_body(&self, messages: &[Message]) -> OpenAiRequest {
        OpenAiRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: m.role.wire_name().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiChatClient {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, turns = messages.len(), "Sending chat completion request");

        let mut http_req = self.http_client.post(&url).json(&self.build_body(messages));
        if let Some(ref key) = self.api_key {
            http_req = http_req.bearer_auth(key);
        }

        let response = http_req
            .send()
            .await
            .map_err(|e| MemoryError::unavailable("OpenAI request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(MemoryError::BackendUnavailable(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let oai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::unavailable("Failed to parse OpenAI response", e))?;

        oai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| MemoryError::BackendUnavailable("No choices in OpenAI response".to_string()))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/models", self.base_url);
        let mut req = self.http_client.get(&url).timeout(Duration::from_secs(5));
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        Ok(req.send().await.map(|r| r.status().is_success()).unwrap_or(false))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
