//! Reflection extraction
//!
//! Sends a transcript to the completion service with a fixed instruction and
//! validates the reply against the four-field reflection schema. The caller
//! either gets a fully populated `Reflection` or `MalformedReflection`.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::{MemoryError, Result};
use crate::llm::CompletionService;
use crate::memory::prompts::reflection_prompt;
use crate::memory::types::{Reflection, MAX_CONTEXT_TAGS, NOT_AVAILABLE};
use crate::types::Message;

/// Longest accepted context tag, in characters
const MAX_TAG_CHARS: usize = 64;

/// Raw shape of the model reply; every field is required
#[derive(Debug, Deserialize)]
struct RawReflection {
    context_tags: Vec<Value>,
    conversation_summary: Value,
    what_worked: Value,
    what_to_avoid: Value,
}

pub struct ReflectionExtractor {
    completion: Arc<dyn CompletionService>,
}

impl ReflectionExtractor {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Extract a reflection from a formatted transcript
    pub async fn extract(&self, conversation: &str) -> Result<Reflection> {
        let prompt = reflection_prompt(conversation);
        let reply = self.completion.generate(&[Message::human(prompt)]).await?;
        debug!(reply_len = reply.len(), "Received reflection reply");

        parse_reflection(&reply).map_err(|e| {
            warn!(error = %e, "Reflection reply failed schema validation");
            e
        })
    }
}

/// Parse and validate a completion reply into a `Reflection`
pub fn parse_reflection(reply: &str) -> Result<Reflection> {
    let json = extract_json_object(reply)
        .ok_or_else(|| MemoryError::MalformedReflection("no JSON object in reply".to_string()))?;

    let raw: RawReflection = serde_json::from_str(json)
        .map_err(|e| MemoryError::MalformedReflection(e.to_string()))?;

    let mut context_tags = Vec::with_capacity(raw.context_tags.len());
    for tag in raw.context_tags {
        let tag = match tag {
            Value::String(s) => s.trim().chars().take(MAX_TAG_CHARS).collect::<String>().trim_end().to_string(),
            other => {
                return Err(MemoryError::MalformedReflection(format!(
                    "context tag is not a string: {}",
                    other
                )))
            }
        };
        if !tag.is_empty() {
            context_tags.push(tag);
        }
    }
    if context_tags.is_empty() {
        context_tags.push(NOT_AVAILABLE.to_string());
    }
    context_tags.truncate(MAX_CONTEXT_TAGS);

    Ok(Reflection {
        context_tags,
        conversation_summary: sentence_field("conversation_summary", raw.conversation_summary)?,
        what_worked: sentence_field("what_worked", raw.what_worked)?,
        what_to_avoid: sentence_field("what_to_avoid", raw.what_to_avoid)?,
    })
}

fn sentence_field(name: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(NOT_AVAILABLE.to_string()),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(MemoryError::MalformedReflection(format!(
            "{} is not a string: {}",
            name, other
        ))),
    }
}

/// Slice from the first `{` to the last `}`, tolerating code fences and chatter
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedReply {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for FixedReply {
        async fn generate(&self, messages: &[Message]) -> Result<String> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    const VALID: &str = r#"{
        "context_tags": ["fat_loss_goals", "calorie_targets"],
        "conversation_summary": "Set a daily calorie goal for weight loss",
        "what_worked": "Asking about current eating habits first",
        "what_to_avoid": "Prescribing a diet before knowing restrictions"
    }"#;

    #[test]
    fn test_parse_valid_reflection() {
        let reflection = parse_reflection(VALID).unwrap();
        assert_eq!(reflection.context_tags, vec!["fat_loss_goals", "calorie_targets"]);
        assert_eq!(reflection.what_worked, "Asking about current eating habits first");
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = format!("Here you go:\n```json\n{}\n```", VALID);
        assert!(parse_reflection(&reply).is_ok());
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let reply = r#"{"context_tags": ["a"], "conversation_summary": "s", "what_worked": "w"}"#;
        assert!(matches!(
            parse_reflection(reply),
            Err(MemoryError::MalformedReflection(_))
        ));
    }

    #[test]
    fn test_non_json_is_malformed() {
        assert!(matches!(
            parse_reflection("I could not summarise this."),
            Err(MemoryError::MalformedReflection(_))
        ));
    }

    #[test]
    fn test_non_string_field_is_malformed() {
        let reply = r#"{"context_tags": ["a"], "conversation_summary": null, "what_worked": "w", "what_to_avoid": "x"}"#;
        assert!(parse_reflection(reply).is_err());

        let reply = r#"{"context_tags": [1, 2], "conversation_summary": "s", "what_worked": "w", "what_to_avoid": "x"}"#;
        assert!(parse_reflection(reply).is_err());
    }

    #[test]
    fn test_blank_fields_become_sentinel() {
        let reply = r#"{"context_tags": [], "conversation_summary": " ", "what_worked": "", "what_to_avoid": "N/A"}"#;
        let reflection = parse_reflection(reply).unwrap();
        assert_eq!(reflection.context_tags, vec![NOT_AVAILABLE]);
        assert_eq!(reflection.conversation_summary, NOT_AVAILABLE);
        assert_eq!(reflection.what_worked, NOT_AVAILABLE);
        assert_eq!(reflection.what_to_avoid, NOT_AVAILABLE);
    }

    #[test]
    fn test_tags_truncated_to_four() {
        let reply = r#"{"context_tags": ["a","b","c","d","e"], "conversation_summary": "s", "what_worked": "w", "what_to_avoid": "x"}"#;
        let reflection = parse_reflection(reply).unwrap();
        assert_eq!(reflection.context_tags.len(), MAX_CONTEXT_TAGS);
    }

    #[test]
    fn test_long_tag_is_truncated() {
        let long_tag = "x".repeat(MAX_TAG_CHARS + 1);
        let reply = format!(
            r#"{{"context_tags": ["{}", "macros"], "conversation_summary": "s", "what_worked": "w", "what_to_avoid": "x"}}"#,
            long_tag
        );
        let reflection = parse_reflection(&reply).unwrap();
        assert_eq!(reflection.context_tags[0], "x".repeat(MAX_TAG_CHARS));
        assert_eq!(reflection.context_tags[1], "macros");
    }

    #[tokio::test]
    async fn test_extract_sends_transcript() {
        let service = Arc::new(FixedReply {
            reply: VALID.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let extractor = ReflectionExtractor::new(service.clone());

        let reflection = extractor.extract("HUMAN: I want to lose weight").await.unwrap();
        assert_eq!(reflection.context_tags.len(), 2);

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].ends_with("HUMAN: I want to lose weight"));
    }
}
