use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::MemoryError;

/// Upper bound on procedural guidelines, whatever the config says
pub const MAX_GUIDELINES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub procedural: ProceduralConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Ollama,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            temperature: 0.7,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    Ollama,
    Local,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Insert every transcript, duplicates included
    Allow,
    /// Skip a transcript whose fingerprint is already stored
    SkipDuplicates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
    pub qdrant_url: String,
    pub conversation_collection: String,
    pub chunk_collection: String,
    pub dedup: DedupPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            data_dir: default_data_dir(),
            qdrant_url: "http://localhost:6334".to_string(),
            conversation_collection: "episodic_memory".to_string(),
            chunk_collection: "semantic_chunks".to_string(),
            dedup: DedupPolicy::Allow,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight of the vector signal; the lexical signal gets `1 - alpha`
    pub alpha: f32,
    pub episodic_limit: usize,
    pub semantic_top_k: usize,
    /// Vector neighbours fetched before lexical re-scoring (qdrant backend)
    pub candidate_pool: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            episodic_limit: 1,
            semantic_top_k: 15,
            candidate_pool: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProceduralConfig {
    /// Guideline document; defaults to `<data_dir>/procedural_memory.txt`
    pub path: Option<PathBuf>,
    pub max_guidelines: usize,
}

impl Default for ProceduralConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_guidelines: MAX_GUIDELINES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 0,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemobuddy")
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit file, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Config::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(config_path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".mnemobuddy").join("config.toml"))
    }

    /// Resolved path of the procedural memory document
    pub fn procedural_path(&self) -> PathBuf {
        self.procedural
            .path
            .clone()
            .unwrap_or_else(|| self.store.data_dir.join("procedural_memory.txt"))
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        let alpha = self.retrieval.alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(MemoryError::Config(format!(
                "retrieval.alpha must be within [0, 1], got {}",
                alpha
            )));
        }
        if self.retrieval.semantic_top_k == 0 || self.retrieval.episodic_limit == 0 {
            return Err(MemoryError::Config(
                "retrieval limits must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_GUIDELINES).contains(&self.procedural.max_guidelines) {
            return Err(MemoryError::Config(format!(
                "procedural.max_guidelines must be within 1..={}",
                MAX_GUIDELINES
            )));
        }
        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(MemoryError::Config(
                "ingest.chunk_overlap must be smaller than a non-zero chunk_size".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Qdrant
            && self.embedding.provider == EmbeddingProvider::None
        {
            return Err(MemoryError::Config(
                "the qdrant backend needs an embedding provider".to_string(),
            ));
        }
        Ok(())
    }
}
