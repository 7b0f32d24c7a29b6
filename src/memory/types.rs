//! Core data types for the three memory tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Unique identifier for stored records
pub type RecordId = uuid::Uuid;

/// Placeholder for any reflection field the model could not determine
pub const NOT_AVAILABLE: &str = "N/A";

/// Most tags a reflection may carry
pub const MAX_CONTEXT_TAGS: usize = 4;

/// Structured takeaways extracted from one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    /// 2-4 short keywords identifying similar situations
    pub context_tags: Vec<String>,
    /// One sentence describing what the conversation accomplished
    pub conversation_summary: String,
    /// Most effective approach used
    pub what_worked: String,
    /// Most important pitfall to avoid
    pub what_to_avoid: String,
}

/// A stored past conversation with its reflection
///
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: RecordId,
    pub conversation: String,
    pub context_tags: Vec<String>,
    pub conversation_summary: String,
    pub what_worked: String,
    pub what_to_avoid: String,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the normalised transcript
    pub fingerprint: String,
}

impl ConversationRecord {
    /// Build a record from a formatted transcript and its reflection
    pub fn new(conversation: String, reflection: Reflection) -> Self {
        let fingerprint = fingerprint(&conversation);
        Self {
            id: uuid::Uuid::new_v4(),
            conversation,
            context_tags: reflection.context_tags,
            conversation_summary: reflection.conversation_summary,
            what_worked: reflection.what_worked,
            what_to_avoid: reflection.what_to_avoid,
            created_at: Utc::now(),
            fingerprint,
        }
    }

    /// Text indexed for both vector and keyword search
    pub fn search_text(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}",
            self.context_tags.join(" "),
            self.conversation_summary,
            self.what_worked,
            self.what_to_avoid,
            self.conversation
        )
    }
}

/// A read-only fragment of the reference corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk: String,
}

impl DocumentChunk {
    pub fn new(chunk: impl Into<String>) -> Self {
        Self {
            chunk: chunk.into(),
        }
    }
}

/// Content fingerprint of a transcript: whitespace collapsed, lower-cased
pub fn fingerprint(conversation: &str) -> String {
    let normalized = conversation
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reflection() -> Reflection {
        Reflection {
            context_tags: vec!["fat_loss_goals".into(), "calorie_targets".into()],
            conversation_summary: "Set a daily calorie goal".into(),
            what_worked: "Asking about current habits".into(),
            what_to_avoid: "Generic meal plans".into(),
        }
    }

    #[test]
    fn test_record_from_reflection() {
        let record = ConversationRecord::new("HUMAN: hi".into(), reflection());
        assert_eq!(record.context_tags.len(), 2);
        assert_eq!(record.what_worked, "Asking about current habits");
        assert_eq!(record.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_normalizes_whitespace_and_case() {
        assert_eq!(
            fingerprint("HUMAN: I want  to lose weight\n"),
            fingerprint("human: i want to lose weight")
        );
        assert_ne!(fingerprint("HUMAN: a"), fingerprint("HUMAN: b"));
    }

    #[test]
    fn test_search_text_includes_tags_and_lessons() {
        let record = ConversationRecord::new("HUMAN: squats".into(), reflection());
        let text = record.search_text();
        assert!(text.contains("fat_loss_goals"));
        assert!(text.contains("Generic meal plans"));
        assert!(text.contains("HUMAN: squats"));
    }

    #[test]
    fn test_record_serialization() {
        let record = ConversationRecord::new("HUMAN: hi".into(), reflection());
        let json = serde_json::to_string(&record).unwrap();
        let back: ConversationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
