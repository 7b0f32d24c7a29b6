//! Text embedding providers for the vector half of hybrid retrieval
//!
//! - Ollama: remote `nomic-embed-text` embeddings over HTTP
//! - Local: in-process BERT sentence embeddings via Candle

pub mod local;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::errors::Result;

pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;

/// Turns text into a dense vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;
}

/// Build the configured embedder; `None` selects lexical-only retrieval
pub async fn from_config(config: &EmbeddingConfig) -> Result<Option<Arc<dyn Embedder>>> {
    let embedder: Option<Arc<dyn Embedder>> = match config.provider {
        EmbeddingProvider::Ollama => Some(Arc::new(OllamaEmbedder::from_config(config)?)),
        EmbeddingProvider::Local => Some(Arc::new(LocalEmbedder::load().await?)),
        EmbeddingProvider::None => None,
    };
    Ok(embedder)
}
