//! Local sentence embeddings via Candle
//!
//! Downloads a small BERT sentence encoder from the HuggingFace Hub on first
//! use, then embeds entirely in-process. Inference runs on a blocking thread.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::info;

use crate::embedding::Embedder;
use crate::errors::{MemoryError, Result};

const MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

fn embedding_err(context: &str, err: impl std::fmt::Display) -> MemoryError {
    MemoryError::Embedding(format!("{}: {}", context, err))
}

struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl BertEncoder {
    fn load() -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| embedding_err("Failed to create HuggingFace API client", e))?;
        let repo = api.repo(Repo::new(MODEL_ID.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| embedding_err("Failed to download model config", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| embedding_err("Failed to download tokenizer", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| embedding_err("Failed to download model weights", e))?;

        let config_contents = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_contents)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| embedding_err("Failed to load tokenizer", e))?;

        // SAFETY: the weights file is owned by the hub cache and not mutated while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| embedding_err("Failed to load model weights", e))?
        };

        let model = BertModel::load(vb, &config).map_err(|e| embedding_err("Failed to create BERT model", e))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension: config.hidden_size,
        })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| embedding_err("Tokenization failed", e))?;

        let max_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);
        let batch_size = texts.len();

        let mut flat_ids = vec![0u32; batch_size * max_len];
        let mut flat_mask = vec![0u32; batch_size * max_len];
        for (row, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let start = row * max_len;
            flat_ids[start..start + ids.len()].copy_from_slice(ids);
            flat_mask[start..start + mask.len()].copy_from_slice(mask);
        }

        let run = || -> candle_core::Result<Vec<Vec<f32>>> {
            let token_ids = Tensor::from_vec(flat_ids, (batch_size, max_len), &self.device)?;
            let attention_mask = Tensor::from_vec(flat_mask, (batch_size, max_len), &self.device)?;
            let token_type_ids = token_ids.zeros_like()?;

            let hidden = self
                .model
                .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
            let pooled = Self::mean_pool(&hidden, &attention_mask)?;
            let normalized = pooled.broadcast_div(&pooled.sqr()?.sum_keepdim(1)?.sqrt()?)?;
            normalized.to_vec2::<f32>()
        };

        run().map_err(|e| embedding_err("Forward pass failed", e))
    }

    /// Mean pooling with attention mask
    fn mean_pool(embeddings: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let mask_expanded = attention_mask
            .unsqueeze(2)?
            .expand(embeddings.shape())?
            .to_dtype(embeddings.dtype())?;

        let sum_embeddings = (embeddings * &mask_expanded)?.sum(1)?;
        let sum_mask = mask_expanded.sum(1)?.clamp(1e-9, f64::MAX)?;

        sum_embeddings.broadcast_div(&sum_mask)
    }
}

/// In-process embedder backed by a BERT sentence encoder
#[derive(Clone)]
pub struct LocalEmbedder {
    encoder: Arc<BertEncoder>,
}

impl LocalEmbedder {
    /// Download (first run) and load the encoder
    pub async fn load() -> Result<Self> {
        let encoder = tokio::task::spawn_blocking(BertEncoder::load)
            .await
            .map_err(|e| embedding_err("Model loading task failed", e))??;
        info!(model = MODEL_ID, dimension = encoder.dimension, "Loaded local embedding model");
        Ok(Self {
            encoder: Arc::new(encoder),
        })
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| MemoryError::Embedding("encoder returned no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encoder = Arc::clone(&self.encoder);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        tokio::task::spawn_blocking(move || encoder.encode(&owned))
            .await
            .map_err(|e| embedding_err("Embedding task failed", e))?
    }

    fn dimension(&self) -> usize {
        self.encoder.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embedding_dimension() {
        let embedder = LocalEmbedder::load().await.expect("Failed to load model");
        assert_eq!(embedder.dimension(), 384);
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embed_batch_is_normalized() {
        let embedder = LocalEmbedder::load().await.expect("Failed to load model");
        let vectors = embedder.embed_batch(&["Hello", "World", "Test"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        for v in vectors {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-3);
        }
    }

    #[tokio::test]
    #[ignore] // Integration test - requires model download
    async fn test_embed_empty_batch() {
        let embedder = LocalEmbedder::load().await.expect("Failed to load model");
        let vectors = embedder.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
