//! Semantic memory: grounding chunks from the reference corpus

use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::memory::prompts::semantic_context_prompt;
use crate::memory::types::DocumentChunk;
use crate::store::hybrid::DEFAULT_ALPHA;
use crate::store::MemoryStore;
use crate::types::Message;

/// Chunks pulled into one grounding turn
pub const DEFAULT_TOP_K: usize = 15;

/// Outcome of a best-effort batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub inserted: usize,
    pub failed: usize,
}

pub struct SemanticMemory {
    store: Arc<dyn MemoryStore>,
    alpha: f32,
    top_k: usize,
}

impl SemanticMemory {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            alpha: DEFAULT_ALPHA,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Insert every chunk independently; a failed insert does not stop the batch
    pub async fn store_chunks<S: AsRef<str>>(&self, chunks: &[S]) -> ChunkReport {
        let chunks: Vec<DocumentChunk> = chunks.iter().map(|c| DocumentChunk::new(c.as_ref())).collect();
        let mut report = ChunkReport::default();
        for (i, result) in self.store.insert_chunks(&chunks).await.into_iter().enumerate() {
            match result {
                Ok(()) => report.inserted += 1,
                Err(e) => {
                    warn!(chunk = i, error = %e, "Failed to store chunk");
                    report.failed += 1;
                }
            }
        }
        debug!(inserted = report.inserted, failed = report.failed, "Stored chunks");
        report
    }

    /// Top chunks for `query` as `CHUNK n:` blocks; empty when nothing matches
    pub async fn recall(&self, query: &str) -> Result<String> {
        self.recall_top(query, self.top_k).await
    }

    pub async fn recall_top(&self, query: &str, k: usize) -> Result<String> {
        let chunks = self.store.search_chunks(query, self.alpha, k).await?;
        debug!(found = chunks.len(), "Semantic recall");
        Ok(format_chunks(&chunks))
    }

    /// Ephemeral grounding turn for a single invocation
    pub async fn build_context_message(&self, query: &str) -> Result<Message> {
        let memories = self.recall(query).await?;
        Ok(Message::human(semantic_context_prompt(&memories)))
    }
}

fn format_chunks(chunks: &[DocumentChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| format!("\nCHUNK {}:\n{}", i + 1, c.chunk.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::prompts::SEMANTIC_CONTEXT_PREAMBLE;
    use crate::store::LocalStore;
    use crate::types::Role;

    #[test]
    fn test_format_chunks() {
        let chunks = vec![DocumentChunk::new("  first \n"), DocumentChunk::new("second")];
        assert_eq!(format_chunks(&chunks), "\nCHUNK 1:\nfirst\nCHUNK 2:\nsecond");
        assert_eq!(format_chunks(&[]), "");
    }

    #[tokio::test]
    async fn test_empty_corpus_recall() {
        let semantic = SemanticMemory::new(Arc::new(LocalStore::in_memory(None).unwrap()));
        assert_eq!(semantic.recall("diet").await.unwrap(), "");

        let message = semantic.build_context_message("diet").await.unwrap();
        assert_eq!(message.role, Role::Human);
        assert!(message.content.starts_with(SEMANTIC_CONTEXT_PREAMBLE));
        assert!(!message.content.contains("CHUNK"));
    }

    #[tokio::test]
    async fn test_store_and_recall_chunks() {
        let semantic = SemanticMemory::new(Arc::new(LocalStore::in_memory(None).unwrap()));
        let report = semantic
            .store_chunks(&["Protein supports muscle repair", "Sleep aids recovery"])
            .await;
        assert_eq!(report, ChunkReport { inserted: 2, failed: 0 });

        let text = semantic.recall("protein").await.unwrap();
        assert_eq!(text, "\nCHUNK 1:\nProtein supports muscle repair");
    }
}
