//! Episodic memory: past conversations and the lessons drawn from them
//!
//! `store` turns a finished transcript into a `ConversationRecord` through the
//! reflection extractor; `recall` returns the single best hybrid match.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::DedupPolicy;
use crate::errors::Result;
use crate::memory::reflection::ReflectionExtractor;
use crate::memory::transcript::format_conversation;
use crate::memory::types::{fingerprint, ConversationRecord};
use crate::session::context::RecalledContext;
use crate::store::hybrid::DEFAULT_ALPHA;
use crate::store::MemoryStore;
use crate::types::Message;

pub struct EpisodicMemory {
    store: Arc<dyn MemoryStore>,
    extractor: ReflectionExtractor,
    alpha: f32,
    dedup: DedupPolicy,
}

impl EpisodicMemory {
    pub fn new(store: Arc<dyn MemoryStore>, extractor: ReflectionExtractor) -> Self {
        Self {
            store,
            extractor,
            alpha: DEFAULT_ALPHA,
            dedup: DedupPolicy::Allow,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// Reflect on a transcript and append it as one record.
    ///
    /// Returns `None` when the duplicate policy skipped the insert.
    pub async fn store(&self, messages: &[Message]) -> Result<Option<ConversationRecord>> {
        let conversation = format_conversation(messages);

        if self.dedup == DedupPolicy::SkipDuplicates
            && self.store.has_fingerprint(&fingerprint(&conversation)).await?
        {
            info!("Skipping duplicate conversation");
            return Ok(None);
        }

        let reflection = self.extractor.extract(&conversation).await?;
        let record = ConversationRecord::new(conversation, reflection);

        if let Err(e) = self.store.insert_conversation(&record).await {
            error!(error = %e, id = %record.id, "Failed to store conversation");
            return Err(e);
        }
        info!(id = %record.id, tags = ?record.context_tags, "Stored conversation");
        Ok(Some(record))
    }

    /// Best matching past conversation, if any
    pub async fn recall(&self, query: &str) -> Result<Option<ConversationRecord>> {
        let best = self.recall_top(query, 1).await?.into_iter().next();
        debug!(found = best.is_some(), "Episodic recall");
        Ok(best)
    }

    /// Up to `limit` past conversations, best first
    pub async fn recall_top(&self, query: &str, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.store.search_conversations(query, self.alpha, limit).await
    }

    /// Fold a recalled record into the session's context
    pub fn integrate(&self, record: &ConversationRecord, context: &RecalledContext) -> RecalledContext {
        context.integrate(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MemoryError;
    use crate::llm::CompletionService;
    use crate::store::{Collection, LocalStore};
    use async_trait::async_trait;

    struct Reply(&'static str);

    #[async_trait]
    impl CompletionService for Reply {
        async fn generate(&self, _messages: &[Message]) -> Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "reply"
        }
    }

    const REFLECTION: &str = r#"{"context_tags": ["fat_loss_goals"], "conversation_summary": "Set a calorie goal", "what_worked": "Asking about habits. Being specific", "what_to_avoid": "Crash diets"}"#;

    fn memory(reply: &'static str, store: Arc<LocalStore>) -> EpisodicMemory {
        EpisodicMemory::new(store, ReflectionExtractor::new(Arc::new(Reply(reply))))
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("sys"),
            Message::human("I want to lose weight"),
            Message::assistant("Sure, let's set a calorie goal"),
        ]
    }

    #[tokio::test]
    async fn test_store_then_recall() {
        let store = Arc::new(LocalStore::in_memory(None).unwrap());
        let episodic = memory(REFLECTION, store.clone());

        let record = episodic.store(&transcript()).await.unwrap().unwrap();
        assert_eq!(
            record.conversation,
            "HUMAN: I want to lose weight\nASSISTANT: Sure, let's set a calorie goal"
        );

        let recalled = episodic.recall("weight").await.unwrap().unwrap();
        assert_eq!(recalled.id, record.id);
    }

    #[tokio::test]
    async fn test_recall_empty_store_is_none() {
        let episodic = memory(REFLECTION, Arc::new(LocalStore::in_memory(None).unwrap()));
        assert!(episodic.recall("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_reflection_stores_nothing() {
        let store = Arc::new(LocalStore::in_memory(None).unwrap());
        let episodic = memory("not json", store.clone());

        let err = episodic.store(&transcript()).await.unwrap_err();
        assert!(matches!(err, MemoryError::MalformedReflection(_)));
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_policy() {
        let store = Arc::new(LocalStore::in_memory(None).unwrap());
        let allow = memory(REFLECTION, store.clone());
        allow.store(&transcript()).await.unwrap();
        allow.store(&transcript()).await.unwrap();
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 2);

        let skip = memory(REFLECTION, store.clone()).with_dedup(DedupPolicy::SkipDuplicates);
        assert!(skip.store(&transcript()).await.unwrap().is_none());
        assert_eq!(store.count(Collection::Conversations).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_integrate_splits_lessons() {
        let store = Arc::new(LocalStore::in_memory(None).unwrap());
        let episodic = memory(REFLECTION, store);
        let record = episodic.store(&transcript()).await.unwrap().unwrap();

        let context = episodic.integrate(&record, &RecalledContext::new());
        assert!(context.what_worked.contains("Asking about habits"));
        assert!(context.what_worked.contains("Being specific"));
        assert!(context.what_to_avoid.contains("Crash diets"));
    }
}
