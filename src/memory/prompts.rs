//! Fixed prompt templates for the three memory tiers

use std::collections::BTreeSet;

/// Returned by procedural memory before any guideline has been written
pub const NO_GUIDELINES: &str = "No guidelines available yet.";

/// Preamble of the ephemeral grounding turn
pub const SEMANTIC_CONTEXT_PREAMBLE: &str = "If needed, use this grounded context to factually answer the next question.
Let me know if you do not have enough information or context to answer.";

const REFLECTION_TEMPLATE: &str = r#"You are analyzing conversations about personal fitness, nutrition guidance, health data, and user preferences to create memories that will help guide future interactions. Extract the elements that would be most useful when a similar training or nutrition discussion comes up again.

Rules:
1. For any field where you don't have enough information or the field isn't relevant, use "N/A"
2. Be extremely concise - each string should be one clear, actionable sentence
3. Keep only information that helps with similar future conversations
4. context_tags must be specific enough to match similar situations but general enough to be reusable

Output valid JSON in exactly this format:
{
    "context_tags": [string, ...],
    "conversation_summary": string,
    "what_worked": string,
    "what_to_avoid": string
}

context_tags holds 2-4 keywords. conversation_summary is one sentence on what the conversation accomplished. what_worked is the most effective approach used. what_to_avoid is the most important pitfall.

Examples:
- Good context_tags: ["strength_training", "plant_based_nutrition", "fat_loss_goals"]
- Good conversation_summary: "Established a structured workout plan and daily calorie goal for healthy weight loss"
- Good what_worked: "Personalizing exercise and diet recommendations based on body metrics, dietary restrictions, and fitness goals"
- Good what_to_avoid: "Suggesting generic workouts without considering the user's injury history or time constraints"

Do not include any text outside the JSON object in your response.

Here is the prior conversation:

"#;

/// Reflection extraction prompt for one formatted transcript
pub fn reflection_prompt(conversation: &str) -> String {
    format!("{}{}", REFLECTION_TEMPLATE, conversation)
}

/// Everything the episodic system turn is composed from
pub struct EpisodicPromptParts<'a> {
    pub current_match: Option<&'a str>,
    pub previous_conversations: &'a [String],
    pub what_worked: &'a BTreeSet<String>,
    pub what_to_avoid: &'a BTreeSet<String>,
    pub guidelines: &'a str,
}

/// System turn fusing recalled conversations, lessons and guidelines
pub fn episodic_system_prompt(parts: &EpisodicPromptParts<'_>) -> String {
    let join_set = |set: &BTreeSet<String>| set.iter().map(String::as_str).collect::<Vec<_>>().join(" ");

    format!(
        "You are a helpful AI Assistant. Answer the user's questions to the best of your ability.
You recall similar conversations with the user, here are the details:

Current Conversation Match: {}
Previous Conversations: {}
What has worked well: {}
What to avoid: {}

Use these memories as context for your response to the user.

Additionally, here are 10 guidelines for interactions with the current user: {}",
        parts.current_match.unwrap_or(crate::memory::types::NOT_AVAILABLE),
        parts.previous_conversations.join(" | "),
        join_set(parts.what_worked),
        join_set(parts.what_to_avoid),
        parts.guidelines,
    )
}

/// Ephemeral grounding turn wrapping semantic recall output
pub fn semantic_context_prompt(memories: &str) -> String {
    format!("{}\n\n{}\n", SEMANTIC_CONTEXT_PREAMBLE, memories)
}

/// Guideline refinement prompt
pub fn procedural_update_prompt(
    current_takeaways: &str,
    what_worked: &BTreeSet<String>,
    what_to_avoid: &BTreeSet<String>,
    max_guidelines: usize,
) -> String {
    let bullets = |set: &BTreeSet<String>| {
        if set.is_empty() {
            crate::memory::types::NOT_AVAILABLE.to_string()
        } else {
            set.iter().map(|s| format!("- {}", s)).collect::<Vec<_>>().join("\n")
        }
    };

    format!(
        r#"You are maintaining a continuously updated list of the most important procedural behavior instructions for an AI assistant. Refine the list of key takeaways using new conversation feedback while keeping the most valuable existing insights.

CURRENT TAKEAWAYS:
{current}

NEW FEEDBACK:
What Worked Well:
{worked}

What To Avoid:
{avoid}

Generate an updated list of up to {max} key takeaways that combines:
1. The most valuable insights from the current takeaways
2. New learnings from the recent feedback
3. Any synthesized insights combining multiple learnings

Requirements for each takeaway:
- Must be specific and actionable
- Should address a distinct aspect of behavior
- Include a clear rationale
- Written in imperative form (e.g., "Maintain conversation context by...")

Format each takeaway on its own line as:
[#]. [Instruction] - [Brief rationale]

The final list should:
- Be ordered by importance/impact
- Cover a diverse range of interaction aspects
- Focus on concrete behaviors rather than abstract principles
- Preserve particularly valuable existing takeaways
- Incorporate new insights when they provide meaningful improvements

Return only the list, no preamble or explanation."#,
        current = current_takeaways,
        worked = bullets(what_worked),
        avoid = bullets(what_to_avoid),
        max = max_guidelines,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflection_prompt_appends_conversation() {
        let prompt = reflection_prompt("HUMAN: hi");
        assert!(prompt.ends_with("HUMAN: hi"));
        assert!(prompt.contains("\"N/A\""));
    }

    #[test]
    fn test_episodic_prompt_without_match() {
        let empty = BTreeSet::new();
        let prompt = episodic_system_prompt(&EpisodicPromptParts {
            current_match: None,
            previous_conversations: &[],
            what_worked: &empty,
            what_to_avoid: &empty,
            guidelines: NO_GUIDELINES,
        });
        assert!(prompt.contains("Current Conversation Match: N/A"));
        assert!(prompt.contains(NO_GUIDELINES));
    }

    #[test]
    fn test_episodic_prompt_joins_parts() {
        let worked: BTreeSet<String> = ["Asking questions".to_string(), "Being brief".to_string()].into();
        let avoid: BTreeSet<String> = ["Jargon".to_string()].into();
        let previous = vec!["HUMAN: a".to_string(), "HUMAN: b".to_string()];
        let prompt = episodic_system_prompt(&EpisodicPromptParts {
            current_match: Some("HUMAN: c"),
            previous_conversations: &previous,
            what_worked: &worked,
            what_to_avoid: &avoid,
            guidelines: "1. Be kind - it helps",
        });
        assert!(prompt.contains("Current Conversation Match: HUMAN: c"));
        assert!(prompt.contains("Previous Conversations: HUMAN: a | HUMAN: b"));
        assert!(prompt.contains("What has worked well: Asking questions Being brief"));
        assert!(prompt.contains("What to avoid: Jargon"));
    }

    #[test]
    fn test_semantic_prompt_keeps_preamble_when_empty() {
        let prompt = semantic_context_prompt("");
        assert!(prompt.starts_with(SEMANTIC_CONTEXT_PREAMBLE));
        assert!(!prompt.contains("CHUNK"));
    }

    #[test]
    fn test_procedural_prompt_lists_feedback() {
        let worked: BTreeSet<String> = ["Personalizing plans".to_string()].into();
        let prompt = procedural_update_prompt(NO_GUIDELINES, &worked, &BTreeSet::new(), 10);
        assert!(prompt.contains("- Personalizing plans"));
        assert!(prompt.contains("up to 10 key takeaways"));
    }
}
