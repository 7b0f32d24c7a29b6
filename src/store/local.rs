//! In-process memory store
//!
//! Each collection keeps its records in a vector beside a tantivy keyword
//! index, both guarded by one `tokio::sync::RwLock`. With a data directory
//! every insert appends JSON lines to the collection's log and the log is
//! replayed on open; without one the store is ephemeral. Without an embedder,
//! retrieval degrades to lexical substring matching ranked by BM25.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::embedding::Embedder;
use crate::errors::{MemoryError, Result};
use crate::memory::types::{ConversationRecord, DocumentChunk};
use crate::persist::{append_lines, read_optional};
use crate::store::hybrid::{cosine_similarity, hybrid_rank, substring_match, tokenize};
use crate::store::keyword::KeywordIndex;
use crate::store::{Collection, MemoryStore};

const CONVERSATIONS_FILE: &str = "episodic_memory.jsonl";
const CHUNKS_FILE: &str = "semantic_chunks.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry<T> {
    item: T,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Text a record is indexed under
trait Searchable {
    fn search_text(&self) -> String;
}

impl Searchable for ConversationRecord {
    fn search_text(&self) -> String {
        ConversationRecord::search_text(self)
    }
}

impl Searchable for DocumentChunk {
    fn search_text(&self) -> String {
        self.chunk.clone()
    }
}

/// One collection: records in insertion order and their keyword index.
/// A record's position in `entries` is its slot in `keywords`.
struct Records<T> {
    entries: Vec<Entry<T>>,
    keywords: Arc<KeywordIndex>,
}

impl<T: Searchable> Records<T> {
    fn new(entries: Vec<Entry<T>>) -> Result<Self> {
        let keywords = KeywordIndex::new()?;
        let documents: Vec<(usize, String)> = entries
            .iter()
            .enumerate()
            .map(|(slot, e)| (slot, e.item.search_text()))
            .collect();
        keywords.add(&documents)?;
        Ok(Self {
            entries,
            keywords: Arc::new(keywords),
        })
    }
}

pub struct LocalStore {
    conversations: RwLock<Records<ConversationRecord>>,
    chunks: RwLock<Records<DocumentChunk>>,
    embedder: Option<Arc<dyn Embedder>>,
    data_dir: Option<PathBuf>,
}

impl LocalStore {
    /// Ephemeral store; nothing touches the disk
    pub fn in_memory(embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        Self::with_records(Vec::new(), Vec::new(), embedder, None)
    }

    /// Store persisted under `data_dir`, replaying existing record logs
    pub async fn open(data_dir: &Path, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        let dir = data_dir.to_path_buf();
        let (conversations, chunks) = tokio::task::spawn_blocking(move || -> Result<_> {
            Ok((
                load_log::<ConversationRecord>(&dir.join(CONVERSATIONS_FILE))?,
                load_log::<DocumentChunk>(&dir.join(CHUNKS_FILE))?,
            ))
        })
        .await
        .map_err(|e| MemoryError::Generic(format!("load task failed: {}", e)))??;

        info!(
            data_dir = %data_dir.display(),
            conversations = conversations.len(),
            chunks = chunks.len(),
            "Opened local memory store"
        );
        Self::with_records(conversations, chunks, embedder, Some(data_dir.to_path_buf()))
    }

    fn with_records(
        conversations: Vec<Entry<ConversationRecord>>,
        chunks: Vec<Entry<DocumentChunk>>,
        embedder: Option<Arc<dyn Embedder>>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if embedder.is_none() {
            warn!("No embedder configured: retrieval uses lexical substring matching only");
        }
        Ok(Self {
            conversations: RwLock::new(Records::new(conversations)?),
            chunks: RwLock::new(Records::new(chunks)?),
            embedder,
            data_dir,
        })
    }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        match &self.embedder {
            Some(embedder) => Ok(Some(embedder.embed(text).await?)),
            None => Ok(None),
        }
    }

    /// Embed each item, then log and index the embedded ones in one write.
    /// Returns one result per item, in input order.
    async fn insert_many<T>(&self, records: &RwLock<Records<T>>, file: &str, items: Vec<T>) -> Vec<Result<()>>
    where
        T: Searchable + Serialize + Send + Sync,
    {
        let mut results: Vec<Result<()>> = Vec::with_capacity(items.len());
        let mut staged = Vec::new();
        let mut staged_positions = Vec::new();
        for item in items {
            match self.embed(&item.search_text()).await {
                Ok(embedding) => {
                    staged_positions.push(results.len());
                    staged.push(Entry { item, embedding });
                    results.push(Ok(()));
                }
                Err(e) => results.push(Err(e)),
            }
        }

        if let Err(e) = self.commit(records, file, staged).await {
            warn!(error = %e, records = staged_positions.len(), "Failed to persist records");
            for position in staged_positions {
                results[position] = Err(MemoryError::Persistence(e.to_string()));
            }
        }
        results
    }

    async fn commit<T>(&self, records: &RwLock<Records<T>>, file: &str, staged: Vec<Entry<T>>) -> Result<()>
    where
        T: Searchable + Serialize + Send + Sync,
    {
        if staged.is_empty() {
            return Ok(());
        }
        let mut guard = records.write().await;

        if let Some(dir) = &self.data_dir {
            let lines = staged
                .iter()
                .map(serde_json::to_string)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let path = dir.join(file);
            tokio::task::spawn_blocking(move || append_lines(&path, &lines))
                .await
                .map_err(|e| MemoryError::Generic(format!("append task failed: {}", e)))??;
        }

        let start = guard.entries.len();
        let documents: Vec<(usize, String)> = staged
            .iter()
            .enumerate()
            .map(|(i, e)| (start + i, e.item.search_text()))
            .collect();
        guard.entries.extend(staged);

        // The log already holds the records; an index failure only costs keyword recall until reopen
        let keywords = guard.keywords.clone();
        let indexed = tokio::task::spawn_blocking(move || keywords.add(&documents))
            .await
            .map_err(|e| MemoryError::Generic(format!("index task failed: {}", e)))
            .and_then(|r| r);
        if let Err(e) = indexed {
            warn!(error = %e, "Keyword index update failed");
        }

        debug!(file, total = guard.entries.len(), "Inserted records");
        Ok(())
    }

    async fn insert_one<T>(&self, records: &RwLock<Records<T>>, file: &str, item: T) -> Result<()>
    where
        T: Searchable + Serialize + Send + Sync,
    {
        self.insert_many(records, file, vec![item])
            .await
            .into_iter()
            .next()
            .unwrap_or(Ok(()))
    }

    async fn search<T>(&self, records: &RwLock<Records<T>>, query: &str, alpha: f32, limit: usize) -> Result<Vec<T>>
    where
        T: Searchable + Clone + Send + Sync,
    {
        let query_vector = self.embed(query).await?;
        let guard = records.read().await;
        if guard.entries.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut lexical = vec![0.0_f32; guard.entries.len()];
        for (slot, score) in guard.keywords.search(query)? {
            if let Some(s) = lexical.get_mut(slot) {
                *s = score;
            }
        }

        let ranked = match &query_vector {
            Some(qv) => {
                let semantic: Vec<f32> = guard
                    .entries
                    .iter()
                    .map(|e| e.embedding.as_deref().map_or(0.0, |v| cosine_similarity(qv, v)))
                    .collect();
                hybrid_rank(alpha, &semantic, &lexical)
            }
            None => {
                let query_terms = tokenize(query);
                let zeros = vec![0.0; lexical.len()];
                hybrid_rank(0.0, &zeros, &lexical)
                    .into_iter()
                    .filter(|c| substring_match(&query_terms, &guard.entries[c.index].item.search_text()))
                    .collect()
            }
        };

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|c| guard.entries[c.index].item.clone())
            .collect())
    }
}

/// Replay a record log; a torn trailing line from an interrupted append is skipped
fn load_log<T: DeserializeOwned>(path: &Path) -> Result<Vec<Entry<T>>> {
    let Some(contents) = read_optional(path)? else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(path = %path.display(), line = number + 1, error = %e, "Skipping unreadable record"),
        }
    }
    Ok(entries)
}

#[async_trait]
impl MemoryStore for LocalStore {
    async fn insert_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.insert_one(&self.conversations, CONVERSATIONS_FILE, record.clone()).await
    }

    async fn search_conversations(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.search(&self.conversations, query, alpha, limit).await
    }

    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<()> {
        self.insert_one(&self.chunks, CHUNKS_FILE, chunk.clone()).await
    }

    async fn insert_chunks(&self, chunks: &[DocumentChunk]) -> Vec<Result<()>> {
        self.insert_many(&self.chunks, CHUNKS_FILE, chunks.to_vec()).await
    }

    async fn search_chunks(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<DocumentChunk>> {
        self.search(&self.chunks, query, alpha, limit).await
    }

    async fn has_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        let guard = self.conversations.read().await;
        Ok(guard.entries.iter().any(|e| e.item.fingerprint == fingerprint))
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        let n = match collection {
            Collection::Conversations => self.conversations.read().await.entries.len(),
            Collection::Chunks => self.chunks.read().await.entries.len(),
        };
        Ok(n as u64)
    }

    fn supports_hybrid(&self) -> bool {
        self.embedder.is_some()
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
