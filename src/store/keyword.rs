//! BM25 keyword index over one record collection
//!
//! A RAM-resident tantivy index whose documents carry the record's position
//! in its collection (`slot`) and its searchable text. The local store rebuilds
//! it from the snapshot log on open and extends it on every insert.

use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::debug;

use crate::errors::{MemoryError, Result};
use crate::store::hybrid::tokenize;

/// Writer heap; tantivy's per-thread minimum is 15 MB
const WRITER_HEAP_BYTES: usize = 20_000_000;

pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    slot_field: Field,
    text_field: Field,
}

impl KeywordIndex {
    pub fn new() -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let slot_field = schema_builder.add_u64_field("slot", STORED);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let index = Index::create_in_ram(schema_builder.build());

        let writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            slot_field,
            text_field,
        })
    }

    /// Index `(slot, text)` pairs and make them searchable in one commit
    pub fn add(&self, documents: &[(usize, String)]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        {
            let mut writer = self
                .writer
                .lock()
                .map_err(|_| MemoryError::Generic("keyword index writer poisoned".to_string()))?;
            for (slot, text) in documents {
                writer.add_document(doc!(
                    self.slot_field => *slot as u64,
                    self.text_field => text.as_str()
                ))?;
            }
            writer.commit()?;
        }
        self.reader.reload()?;
        debug!(added = documents.len(), "Keyword index committed");
        Ok(())
    }

    /// BM25 score of every document matching any query term, as `(slot, score)`
    pub fn search(&self, query: &str) -> Result<Vec<(usize, f32)>> {
        // Plain lower-case terms: no query-syntax characters or operators reach the parser
        let terms = tokenize(query).join(" ");
        let searcher = self.reader.searcher();
        let total = searcher.num_docs() as usize;
        if terms.is_empty() || total == 0 {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let query = parser
            .parse_query(&terms)
            .map_err(|e| MemoryError::Generic(format!("keyword query rejected: {}", e)))?;

        let hits = searcher.search(&query, &TopDocs::with_limit(total))?;
        let mut scored = Vec::with_capacity(hits.len());
        for (score, address) in hits {
            let document: TantivyDocument = searcher.doc(address)?;
            if let Some(slot) = document.get_first(self.slot_field).and_then(|v| v.as_u64()) {
                scored.push((slot as usize, score));
            }
        }
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(texts: &[&str]) -> KeywordIndex {
        let index = KeywordIndex::new().unwrap();
        let docs: Vec<(usize, String)> = texts.iter().enumerate().map(|(i, t)| (i, t.to_string())).collect();
        index.add(&docs).unwrap();
        index
    }

    #[test]
    fn test_only_matching_documents_score() {
        let index = index(&["protein intake for runners", "sleep and recovery", "protein shakes"]);
        let mut slots: Vec<usize> = index.search("protein").unwrap().into_iter().map(|(s, _)| s).collect();
        slots.sort();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn test_single_match_has_positive_score() {
        let index = index(&["protein protein sleep", "protein creatine", "protein"]);
        let hits = index.search("creatine").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
        assert!(hits[0].1 > 0.0);
    }

    #[test]
    fn test_query_syntax_is_treated_as_text() {
        let index = index(&["How many calories: 2000?"]);
        assert_eq!(index.search("calories: \"2000\" AND (fat)").unwrap().len(), 1);
        assert!(index.search("?!").unwrap().is_empty());
    }

    #[test]
    fn test_incremental_adds_are_visible() {
        let index = KeywordIndex::new().unwrap();
        assert!(index.is_empty());
        index.add(&[(0, "squats".to_string())]).unwrap();
        index.add(&[(1, "deadlifts".to_string())]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.search("deadlifts").unwrap()[0].0, 1);
    }
}
