//! Memory store backends
//!
//! Two record collections (conversations and document chunks) behind one
//! trait. The memory managers only rely on `insert` and `hybrid search`
//! contracts and never know which backend is active.
//!
//! - Local: in-process collections with a tantivy keyword index and
//!   append-only JSON line logs
//! - Qdrant: vector database with lexical re-scoring of the candidate pool

pub mod hybrid;
pub mod keyword;
pub mod local;
pub mod qdrant;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::embedding::Embedder;
use crate::errors::{MemoryError, Result};
use crate::memory::types::{ConversationRecord, DocumentChunk};

pub use local::LocalStore;
pub use qdrant::QdrantStore;

/// The two logical collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Conversations,
    Chunks,
}

/// Persistence and retrieval of memory records
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append one conversation record
    async fn insert_conversation(&self, record: &ConversationRecord) -> Result<()>;

    /// Best-first conversation records by fused score
    async fn search_conversations(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>>;

    /// Append one document chunk
    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<()>;

    /// Append a batch of document chunks, one result per chunk in input order.
    ///
    /// A failed chunk does not stop the rest of the batch.
    async fn insert_chunks(&self, chunks: &[DocumentChunk]) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            results.push(self.insert_chunk(chunk).await);
        }
        results
    }

    /// Best-first document chunks by fused score
    async fn search_chunks(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<DocumentChunk>>;

    /// Whether a conversation with this transcript fingerprint is stored
    async fn has_fingerprint(&self, fingerprint: &str) -> Result<bool>;

    /// Number of records in a collection
    async fn count(&self, collection: Collection) -> Result<u64>;

    /// False when retrieval falls back to lexical matching only
    fn supports_hybrid(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured store backend
pub async fn from_config(
    config: &Config,
    embedder: Option<Arc<dyn Embedder>>,
) -> Result<Arc<dyn MemoryStore>> {
    let store: Arc<dyn MemoryStore> = match config.store.backend {
        StoreBackend::Local => Arc::new(LocalStore::open(&config.store.data_dir, embedder).await?),
        StoreBackend::Qdrant => {
            let embedder = embedder.ok_or_else(|| {
                MemoryError::Config("the qdrant backend needs an embedding provider".to_string())
            })?;
            Arc::new(QdrantStore::connect(&config.store, &config.retrieval, embedder).await?)
        }
    };
    Ok(store)
}
