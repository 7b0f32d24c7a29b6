//! Procedural memory: a short ranked list of behavioural guidelines
//!
//! The document is one text resource of lines shaped
//! `<rank>. <instruction> - <rationale>`. Ranking and merging are left to the
//! completion service; this module only enforces the shape, the length bound
//! and atomic replacement.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::MAX_GUIDELINES;
use crate::errors::Result;
use crate::llm::CompletionService;
use crate::memory::prompts::{procedural_update_prompt, NO_GUIDELINES};
use crate::persist::DocumentResource;
use crate::types::Message;

/// One ranked behavioural instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guideline {
    pub rank: usize,
    pub instruction: String,
    pub rationale: String,
}

impl Guideline {
    /// Parse `<n>. <instruction> - <rationale>`, ignoring markdown emphasis
    /// and heading markers around the parts
    fn parse_line(line: &str) -> Option<Self> {
        let (number, rest) = strip_markup(line).split_once('.')?;
        let rank = strip_markup(number).parse::<usize>().ok()?;
        let (instruction, rationale) = rest.split_once(" - ")?;
        let (instruction, rationale) = (strip_markup(instruction), strip_markup(rationale));
        if instruction.is_empty() || rationale.is_empty() {
            return None;
        }
        Some(Self {
            rank,
            instruction: instruction.to_string(),
            rationale: rationale.to_string(),
        })
    }
}

fn strip_markup(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '#'))
}

impl fmt::Display for Guideline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} - {}", self.rank, self.instruction, self.rationale)
    }
}

/// Ordered guideline list, most important first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuidelineDocument {
    guidelines: Vec<Guideline>,
}

impl GuidelineDocument {
    /// Keep well-formed lines in order, at most `max`, renumbered from 1
    pub fn parse(text: &str, max: usize) -> Self {
        let guidelines = text
            .lines()
            .filter_map(Guideline::parse_line)
            .take(max.min(MAX_GUIDELINES))
            .enumerate()
            .map(|(i, g)| Guideline { rank: i + 1, ..g })
            .collect();
        Self { guidelines }
    }

    pub fn guidelines(&self) -> &[Guideline] {
        &self.guidelines
    }

    pub fn len(&self) -> usize {
        self.guidelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guidelines.is_empty()
    }

    pub fn render(&self) -> String {
        self.guidelines
            .iter()
            .map(Guideline::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ProceduralMemory {
    resource: Arc<dyn DocumentResource>,
    completion: Arc<dyn CompletionService>,
    max_guidelines: usize,
    /// Serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl ProceduralMemory {
    pub fn new(resource: Arc<dyn DocumentResource>, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            resource,
            completion,
            max_guidelines: MAX_GUIDELINES,
            lock: Mutex::new(()),
        }
    }

    pub fn with_max_guidelines(mut self, max: usize) -> Self {
        self.max_guidelines = max.clamp(1, MAX_GUIDELINES);
        self
    }

    /// Current document text, or the placeholder when none exists. Never fails.
    pub async fn read(&self) -> String {
        match self.resource.load().await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => NO_GUIDELINES.to_string(),
            Err(e) => {
                warn!(resource = %self.resource.describe(), error = %e, "Cannot read guidelines");
                NO_GUIDELINES.to_string()
            }
        }
    }

    /// Merge session feedback into the guideline list and rewrite it atomically
    pub async fn update(
        &self,
        what_worked: &BTreeSet<String>,
        what_to_avoid: &BTreeSet<String>,
    ) -> Result<GuidelineDocument> {
        let _guard = self.lock.lock().await;

        let current = self.resource.load().await?.unwrap_or_default();
        let existing = GuidelineDocument::parse(&current, self.max_guidelines);

        if what_worked.is_empty() && what_to_avoid.is_empty() {
            debug!("No new feedback; guidelines unchanged");
            return Ok(existing);
        }

        let current_text = if current.trim().is_empty() { NO_GUIDELINES } else { current.as_str() };
        let prompt = procedural_update_prompt(current_text, what_worked, what_to_avoid, self.max_guidelines);
        let reply = self.completion.generate(&[Message::human(prompt)]).await?;

        let updated = GuidelineDocument::parse(&reply, self.max_guidelines);
        if updated.is_empty() {
            warn!(reply_len = reply.len(), "Guideline reply had no well-formed entries; keeping current list");
            return Ok(existing);
        }

        if let Err(e) = self.resource.save(&updated.render()).await {
            error!(resource = %self.resource.describe(), error = %e, "Failed to write guidelines");
            return Err(e);
        }
        info!(count = updated.len(), "Updated guidelines");
        Ok(updated)
    }
}
