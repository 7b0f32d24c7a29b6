//! In-memory session state
//!
//! `RecalledContext` is a value: integrating a recalled record yields a new
//! context and leaves the old one untouched.

use std::collections::BTreeSet;

use crate::memory::types::{ConversationRecord, NOT_AVAILABLE};
use crate::types::Message;

/// Recalled conversations considered when composing the system turn
const RECENT_WINDOW: usize = 4;
/// Most prior conversations quoted in the system turn
const MAX_PREVIOUS: usize = 3;

/// Lesson separator inside `what_worked` / `what_to_avoid`
const LESSON_DELIMITER: &str = ". ";

/// Everything recalled from episodic memory during one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalledContext {
    /// Distinct recalled transcripts, most recent last
    pub conversations: Vec<String>,
    pub what_worked: BTreeSet<String>,
    pub what_to_avoid: BTreeSet<String>,
}

impl RecalledContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// New context with `record` merged in
    pub fn integrate(&self, record: &ConversationRecord) -> Self {
        let mut conversations = self.conversations.clone();
        if !conversations.iter().any(|c| c == &record.conversation) {
            conversations.push(record.conversation.clone());
        }

        Self {
            conversations,
            what_worked: merge_lessons(&self.what_worked, &record.what_worked),
            what_to_avoid: merge_lessons(&self.what_to_avoid, &record.what_to_avoid),
        }
    }

    /// Up to three of the most recent recalled conversations other than `current`
    pub fn previous_conversations(&self, current: Option<&str>) -> Vec<String> {
        let start = self.conversations.len().saturating_sub(RECENT_WINDOW);
        let others: Vec<String> = self.conversations[start..]
            .iter()
            .filter(|c| Some(c.as_str()) != current)
            .cloned()
            .collect();
        let skip = others.len().saturating_sub(MAX_PREVIOUS);
        others.into_iter().skip(skip).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty() && self.what_worked.is_empty() && self.what_to_avoid.is_empty()
    }
}

/// Split a lesson sentence on ". " and add each fragment to a copy of `set`
fn merge_lessons(set: &BTreeSet<String>, lessons: &str) -> BTreeSet<String> {
    let mut merged = set.clone();
    merged.extend(split_lessons(lessons));
    merged
}

/// Lesson fragments of one reflection field; "N/A" carries no lesson
pub fn split_lessons(lessons: &str) -> Vec<String> {
    lessons
        .split(LESSON_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NOT_AVAILABLE)
        .map(str::to_string)
        .collect()
}

/// State owned by one orchestrator for the lifetime of a session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub recalled: RecalledContext,
    /// Persisted turns; index 0 is always the single system turn
    pub messages: Vec<Message>,
}

impl SessionState {
    pub fn new(system_prompt: String) -> Self {
        Self {
            recalled: RecalledContext::new(),
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Replace the head system turn, keeping exactly one
    pub fn replace_system_turn(&mut self, system_prompt: String) {
        self.messages.retain(|m| !m.is_system());
        self.messages.insert(0, Message::system(system_prompt));
    }

    /// Persisted turns other than the system turn
    pub fn dialogue(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }

    pub fn system_turn_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_system()).count()
    }
}
