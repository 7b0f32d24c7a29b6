mod common;

use std::sync::Arc;

use common::{HashEmbedder, RejectingStore, ScriptedCompletion, REFLECTION_JSON};
use mnemobuddy::embedding::Embedder;
use mnemobuddy::memory::{ChunkReport, DocumentChunk, EpisodicMemory, ReflectionExtractor, SemanticMemory};
use mnemobuddy::store::{Collection, LocalStore, MemoryStore};
use mnemobuddy::types::Message;
use mnemobuddy::MemoryError;
use tempfile::TempDir;

fn embedder() -> Option<Arc<dyn Embedder>> {
    Some(HashEmbedder::new(64))
}

#[tokio::test]
async fn test_exact_tie_keeps_insertion_order() {
    let store = LocalStore::in_memory(embedder()).unwrap();
    store.insert_chunk(&DocumentChunk::new("protein sleep")).await.unwrap();
    store.insert_chunk(&DocumentChunk::new("sleep protein")).await.unwrap();

    let found = store.search_chunks("protein", 0.5, 2).await.unwrap();
    let texts: Vec<&str> = found.iter().map(|c| c.chunk.as_str()).collect();
    assert_eq!(texts, vec!["protein sleep", "sleep protein"]);
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let completion = ScriptedCompletion::new([REFLECTION_JSON]);

    {
        let store = Arc::new(LocalStore::open(temp.path(), embedder()).await.unwrap());
        let episodic = EpisodicMemory::new(store.clone(), ReflectionExtractor::new(completion.clone()));
        episodic
            .store(&[Message::system("sys"), Message::human("I want to lose weight")])
            .await
            .unwrap();
        SemanticMemory::new(store)
            .store_chunks(&["Protein supports muscle repair."])
            .await;
    }

    let reopened = LocalStore::open(temp.path(), embedder()).await.unwrap();
    assert_eq!(reopened.count(Collection::Conversations).await.unwrap(), 1);
    assert_eq!(reopened.count(Collection::Chunks).await.unwrap(), 1);

    let recalled = reopened.search_conversations("lose weight", 0.5, 1).await.unwrap();
    assert_eq!(recalled[0].conversation, "HUMAN: I want to lose weight");
    assert_eq!(recalled[0].context_tags, vec!["fat_loss_goals", "calorie_targets"]);
}

#[tokio::test]
async fn test_degraded_store_matches_substrings() {
    let store = LocalStore::in_memory(None).unwrap();
    assert!(!store.supports_hybrid());
    store.insert_chunk(&DocumentChunk::new("Creatine improves strength output")).await.unwrap();
    store.insert_chunk(&DocumentChunk::new("Sleep eight hours")).await.unwrap();

    let found = store.search_chunks("creatine", 0.5, 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].chunk.starts_with("Creatine"));

    assert!(store.search_chunks("caffeine", 0.5, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_semantic_recall_is_empty_without_chunks() {
    let store = Arc::new(LocalStore::in_memory(embedder()).unwrap());
    let semantic = SemanticMemory::new(store);
    assert_eq!(semantic.recall("anything").await.unwrap(), "");
}

#[tokio::test]
async fn test_store_chunks_continues_past_rejected_insert() {
    let store = RejectingStore::new();
    let semantic = SemanticMemory::new(store.clone());

    let report = semantic
        .store_chunks(&["Protein aids repair", "reject this page", "Sleep aids recovery"])
        .await;

    assert_eq!(report, ChunkReport { inserted: 2, failed: 1 });
    assert_eq!(store.count(Collection::Chunks).await.unwrap(), 2);
    assert!(semantic.recall("sleep").await.unwrap().contains("Sleep aids recovery"));
}

#[tokio::test]
async fn test_rejected_conversation_surfaces_persistence_error() {
    let store = RejectingStore::new();
    let completion = ScriptedCompletion::new([REFLECTION_JSON]);
    let episodic = EpisodicMemory::new(store.clone(), ReflectionExtractor::new(completion.clone()));

    let err = episodic
        .store(&[Message::system("sys"), Message::human("I want to lose weight")])
        .await
        .unwrap_err();

    assert!(matches!(err, MemoryError::Persistence(_)));
    assert_eq!(completion.call_count(), 1);
    assert_eq!(store.count(Collection::Conversations).await.unwrap(), 0);
}
