//! Completion service adapters
//!
//! The memory engine treats the language model as an opaque service: an
//! ordered sequence of role-tagged turns goes in, generated text comes out.

pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};
use crate::errors::Result;
use crate::types::Message;

pub use ollama::OllamaChatClient;
pub use openai::OpenAiChatClient;

/// Text generation contract consumed by every memory component
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate a reply for the given turns
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Whether the service answers at all
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Short name used in logs and diagnostics
    fn name(&self) -> &str;
}

/// Build the configured completion service
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn CompletionService>> {
    let service: Arc<dyn CompletionService> = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaChatClient::from_config(config)?),
        LlmProvider::Openai => Arc::new(OpenAiChatClient::from_config(config)?),
    };
    Ok(service)
}
