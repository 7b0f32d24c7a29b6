//! Qdrant-backed memory store
//!
//! Each record becomes one point: the embedding of its searchable text plus a
//! payload holding the serialized record. Qdrant only ranks by vector, so a
//! search pulls `candidate_pool` nearest neighbours and re-scores that pool
//! with BM25 before fusion. The lexical signal therefore never reaches records
//! outside the vector neighbourhood.

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, r#match::MatchValue, value::Kind, vectors_config::Config as VectorsParams,
        with_payload_selector::SelectorOptions, Condition, CreateCollection, Distance, FieldCondition,
        Filter, Match, PointStruct, ScrollPoints, SearchPoints, Value as QdrantValue, VectorParams,
        VectorsConfig, WithPayloadSelector,
    },
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{RetrievalConfig, StoreConfig};
use crate::embedding::Embedder;
use crate::errors::{MemoryError, Result};
use crate::memory::types::{ConversationRecord, DocumentChunk};
use crate::store::hybrid::{bm25_scores, hybrid_rank, tokenize};
use crate::store::{Collection, MemoryStore};

const RECORD_KEY: &str = "record";
const DOCUMENT_KEY: &str = "document";
const FINGERPRINT_KEY: &str = "fingerprint";

pub struct QdrantStore {
    client: QdrantClient,
    embedder: Arc<dyn Embedder>,
    conversations: String,
    chunks: String,
    candidate_pool: usize,
}

impl QdrantStore {
    /// Connect and make sure both collections exist
    pub async fn connect(
        store: &StoreConfig,
        retrieval: &RetrievalConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let client = QdrantClient::from_url(&store.qdrant_url)
            .build()
            .map_err(|e| MemoryError::unavailable("qdrant client", e))?;

        let qdrant = Self {
            client,
            embedder,
            conversations: store.conversation_collection.clone(),
            chunks: store.chunk_collection.clone(),
            candidate_pool: retrieval.candidate_pool,
        };
        qdrant.ensure_collections().await?;
        info!(url = %store.qdrant_url, "Connected to Qdrant");
        Ok(qdrant)
    }

    async fn ensure_collections(&self) -> Result<()> {
        let existing = self
            .client
            .list_collections()
            .await
            .map_err(|e| MemoryError::unavailable("qdrant list collections", e))?;

        for name in [&self.conversations, &self.chunks] {
            if existing.collections.iter().any(|c| &c.name == name) {
                continue;
            }
            self.client
                .create_collection(&CreateCollection {
                    collection_name: name.clone(),
                    vectors_config: Some(VectorsConfig {
                        config: Some(VectorsParams::Params(VectorParams {
                            size: self.embedder.dimension() as u64,
                            distance: Distance::Cosine.into(),
                            ..Default::default()
                        })),
                    }),
                    ..Default::default()
                })
                .await
                .map_err(|e| MemoryError::unavailable(&format!("qdrant create {}", name), e))?;
            info!(collection = %name, "Created Qdrant collection");
        }
        Ok(())
    }

    fn collection_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Conversations => &self.conversations,
            Collection::Chunks => &self.chunks,
        }
    }

    async fn upsert<T: Serialize>(
        &self,
        collection: &str,
        id: String,
        text: &str,
        record: &T,
        fingerprint: Option<&str>,
    ) -> Result<()> {
        let embedding = self.embedder.embed(text).await?;

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert(RECORD_KEY.to_string(), QdrantValue::from(serde_json::to_string(record)?));
        payload.insert(DOCUMENT_KEY.to_string(), QdrantValue::from(text.to_string()));
        if let Some(fp) = fingerprint {
            payload.insert(FINGERPRINT_KEY.to_string(), QdrantValue::from(fp.to_string()));
        }

        self.client
            .upsert_points_blocking(collection, None, vec![PointStruct::new(id, embedding, payload)], None)
            .await
            .map_err(|e| MemoryError::Persistence(format!("qdrant upsert into {}: {}", collection, e)))?;
        debug!(collection, "Upserted point");
        Ok(())
    }

    async fn search<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &str,
        alpha: f32,
        limit: usize,
    ) -> Result<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await?;
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: collection.to_string(),
                vector,
                limit: self.candidate_pool.max(limit) as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                ..Default::default()
            })
            .await
            .map_err(|e| MemoryError::unavailable(&format!("qdrant search {}", collection), e))?;

        let mut records = Vec::with_capacity(response.result.len());
        let mut texts = Vec::with_capacity(response.result.len());
        let mut semantic = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(json) = payload_string(&point.payload, RECORD_KEY) else {
                continue;
            };
            records.push(serde_json::from_str::<T>(&json)?);
            texts.push(tokenize(&payload_string(&point.payload, DOCUMENT_KEY).unwrap_or_default()));
            semantic.push(point.score);
        }

        let lexical = bm25_scores(&tokenize(query), &texts);
        let mut ranked: Vec<Option<T>> = records.into_iter().map(Some).collect();
        Ok(hybrid_rank(alpha, &semantic, &lexical)
            .into_iter()
            .take(limit)
            .filter_map(|c| ranked[c.index].take())
            .collect())
    }
}

fn payload_string(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn keyword_filter(key: &str, value: &str) -> Filter {
    Filter {
        must: vec![Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(value.to_string())),
                }),
                ..Default::default()
            })),
        }],
        ..Default::default()
    }
}

#[async_trait]
impl MemoryStore for QdrantStore {
    async fn insert_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.upsert(
            &self.conversations,
            record.id.to_string(),
            &record.search_text(),
            record,
            Some(&record.fingerprint),
        )
        .await
    }

    async fn search_conversations(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<ConversationRecord>> {
        self.search(&self.conversations, query, alpha, limit).await
    }

    async fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<()> {
        self.upsert(&self.chunks, uuid::Uuid::new_v4().to_string(), &chunk.chunk, chunk, None)
            .await
    }

    async fn search_chunks(&self, query: &str, alpha: f32, limit: usize) -> Result<Vec<DocumentChunk>> {
        self.search(&self.chunks, query, alpha, limit).await
    }

    async fn has_fingerprint(&self, fingerprint: &str) -> Result<bool> {
        let response = self
            .client
            .scroll(&ScrollPoints {
                collection_name: self.conversations.clone(),
                filter: Some(keyword_filter(FINGERPRINT_KEY, fingerprint)),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .map_err(|e| MemoryError::unavailable("qdrant scroll", e))?;
        Ok(!response.result.is_empty())
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        let name = self.collection_name(collection);
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| MemoryError::unavailable(&format!("qdrant info {}", name), e))?;
        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    fn supports_hybrid(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_string() {
        let mut payload = HashMap::new();
        payload.insert("document".to_string(), QdrantValue::from("squats".to_string()));
        payload.insert("n".to_string(), QdrantValue::from(3_i64));

        assert_eq!(payload_string(&payload, "document").as_deref(), Some("squats"));
        assert!(payload_string(&payload, "n").is_none());
        assert!(payload_string(&payload, "missing").is_none());
    }

    #[test]
    fn test_keyword_filter_targets_key() {
        let filter = keyword_filter(FINGERPRINT_KEY, "abc");
        assert_eq!(filter.must.len(), 1);
        match &filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => assert_eq!(field.key, FINGERPRINT_KEY),
            other => panic!("unexpected condition: {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant on localhost:6334
    async fn test_roundtrip_against_server() {
        struct Flat;
        #[async_trait]
        impl Embedder for Flat {
            async fn embed(&self, text: &str) -> Result<Vec<f32>> {
                Ok(vec![text.len() as f32, 1.0, 0.5, 0.25])
            }
            fn dimension(&self) -> usize {
                4
            }
        }

        let mut store = StoreConfig::default();
        store.conversation_collection = format!("test_conv_{}", uuid::Uuid::new_v4());
        store.chunk_collection = format!("test_chunk_{}", uuid::Uuid::new_v4());
        let qdrant = QdrantStore::connect(&store, &RetrievalConfig::default(), Arc::new(Flat))
            .await
            .unwrap();

        qdrant.insert_chunk(&DocumentChunk::new("Squats build legs")).await.unwrap();
        let hits = qdrant.search_chunks("squats", 0.5, 15).await.unwrap();
        assert_eq!(hits[0].chunk, "Squats build legs");
    }
}
