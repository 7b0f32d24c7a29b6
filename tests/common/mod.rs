//! Shared test doubles for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use mnemobuddy::config::Config;
use mnemobuddy::embedding::Embedder;
use mnemobuddy::engine::MemoryEngine;
use mnemobuddy::llm::CompletionService;
use mnemobuddy::persist::FileResource;
use mnemobuddy::memory::{ConversationRecord, DocumentChunk};
use mnemobuddy::store::{Collection, LocalStore, MemoryStore};
use mnemobuddy::types::Message;
use mnemobuddy::{MemoryError, Result};

pub const REFLECTION_JSON: &str = r#"{
    "context_tags": ["fat_loss_goals", "calorie_targets"],
    "conversation_summary": "Set a daily calorie goal for weight loss",
    "what_worked": "Asking about current eating habits. Giving one concrete number",
    "what_to_avoid": "Prescribing a diet before knowing restrictions"
}"#;

pub const GUIDELINES_REPLY: &str = "1. Personalize every plan - goals and bodies differ
2. Ask about injuries before suggesting exercise - avoids harm";

/// Completion service that replays queued replies and records every prompt
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, reason: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Err(reason.into()));
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(MemoryError::BackendUnavailable(reason)),
            None => Err(MemoryError::BackendUnavailable("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Deterministic bag-of-words embedder using FNV-1a token hashing
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Arc<Self> {
        Arc::new(Self { dimension })
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Store that rejects every conversation insert and any chunk mentioning
/// `reject`; everything else goes to an in-memory local store
pub struct RejectingStore {
    inner: LocalStore,
}

impl RejectingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: LocalStore::in_memory(Some(HashEmbedder::new(64))).unwrap(),
        })
    }
}

#[async_trait]
impl MemoryStore for RejectingStore {
    async fn insert_conversation(&self, _record: &ConversationRecord) -> Result<()> {
        Err(MemoryError::Persistence("conversation collection is read-only".to_string()))
    }

    async fn search_conversations(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.inner.search_conversations(query, alpha, limit).await
    }

    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<()> {
        if chunk.chunk.contains("reject") {
            return Err(MemoryError::Persistence("chunk rejected".to_string()));
        }
        self.inner.insert_chunk(chunk).await
    }

    async fn search_chunks(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<DocumentChunk>> {
        self.inner.search_chunks(query, alpha, limit).await
    }

    async fn has_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        self.inner.has_fingerprint(fingerprint).await
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        self.inner.count(collection).await
    }

    fn supports_hybrid(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "rejecting"
    }
}

/// Engine over an in-memory store, a hashing embedder and a guideline file in `dir`
pub fn engine(completion: Arc<ScriptedCompletion>, dir: &Path) -> MemoryEngine {
    let embedder: Arc<dyn Embedder> = HashEmbedder::new(64);
    let store = Arc::new(LocalStore::in_memory(Some(embedder.clone())).unwrap());
    MemoryEngine::with_parts(
        Config::default(),
        completion,
        Some(embedder),
        store,
        Arc::new(FileResource::new(dir.join("procedural_memory.txt"))),
    )
}
