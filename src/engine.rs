//! Wiring of the memory engine from configuration
//!
//! Builds the shared collaborators once (completion service, embedder, store,
//! guideline resource) and hands out memory managers and sessions over them.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::errors::Result;
use crate::llm::{self, CompletionService};
use crate::memory::{EpisodicMemory, ProceduralMemory, ReflectionExtractor, SemanticMemory};
use crate::persist::{DocumentResource, FileResource};
use crate::session::SessionOrchestrator;
use crate::store::{self, MemoryStore};

pub struct MemoryEngine {
    config: Config,
    completion: Arc<dyn CompletionService>,
    embedder: Option<Arc<dyn Embedder>>,
    store: Arc<dyn MemoryStore>,
    guidelines: Arc<dyn DocumentResource>,
}

impl MemoryEngine {
    /// Connect every configured backend
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let completion = llm::from_config(&config.llm)?;
        let embedder = embedding::from_config(&config.embedding).await?;
        let store = store::from_config(&config, embedder.clone()).await?;
        let guidelines: Arc<dyn DocumentResource> = Arc::new(FileResource::new(config.procedural_path()));

        info!(
            completion = completion.name(),
            store = store.backend_name(),
            hybrid = store.supports_hybrid(),
            "Memory engine ready"
        );
        Ok(Self::with_parts(config, completion, embedder, store, guidelines))
    }

    /// Assemble from already-built collaborators
    pub fn with_parts(
        config: Config,
        completion: Arc<dyn CompletionService>,
        embedder: Option<Arc<dyn Embedder>>,
        store: Arc<dyn MemoryStore>,
        guidelines: Arc<dyn DocumentResource>,
    ) -> Self {
        Self {
            config,
            completion,
            embedder,
            store,
            guidelines,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn completion(&self) -> Arc<dyn CompletionService> {
        self.completion.clone()
    }

    pub fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.embedder.clone()
    }

    pub fn store(&self) -> Arc<dyn MemoryStore> {
        self.store.clone()
    }

    pub fn guidelines(&self) -> Arc<dyn DocumentResource> {
        self.guidelines.clone()
    }

    pub fn episodic(&self) -> EpisodicMemory {
        EpisodicMemory::new(self.store.clone(), ReflectionExtractor::new(self.completion.clone()))
            .with_alpha(self.config.retrieval.alpha)
            .with_dedup(self.config.store.dedup)
    }

    pub fn semantic(&self) -> SemanticMemory {
        SemanticMemory::new(self.store.clone())
            .with_alpha(self.config.retrieval.alpha)
            .with_top_k(self.config.retrieval.semantic_top_k)
    }

    pub fn procedural(&self) -> ProceduralMemory {
        ProceduralMemory::new(self.guidelines.clone(), self.completion.clone())
            .with_max_guidelines(self.config.procedural.max_guidelines)
    }

    /// Open a new interactive session over the shared backends
    pub async fn start_session(&self) -> SessionOrchestrator {
        SessionOrchestrator::start(
            self.completion.clone(),
            self.episodic(),
            self.semantic(),
            self.procedural(),
        )
        .await
    }
}
