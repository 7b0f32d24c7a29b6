//! Transcript formatting shared by reflection extraction and episodic storage

use crate::types::Message;

/// Render every turn after the leading system turn as `ROLE: content`.
///
/// The first message is always skipped: it is process-level instruction, not
/// conversational content.
pub fn format_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .skip(1)
        .map(|msg| format!("{}: {}", msg.role.label().to_uppercase(), msg.content))
        .collect::<Vec<_>>()
        .join("\n")
}
