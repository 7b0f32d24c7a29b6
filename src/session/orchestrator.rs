//! Session orchestrator - drives one conversation through the memory tiers
//!
//! Per utterance:
//! - recall the best episodic match and fold it into the session context
//! - rebuild the single system turn from recalled memories and guidelines
//! - add an ephemeral grounding turn from semantic memory
//! - invoke the completion service and keep only the user turn and the reply
//!
//! On exit the transcript is committed to episodic memory and the gathered
//! lessons to procedural memory; a quiet exit drops everything.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::llm::CompletionService;
use crate::memory::procedural::GuidelineDocument;
use crate::memory::prompts::{episodic_system_prompt, EpisodicPromptParts};
use crate::memory::types::ConversationRecord;
use crate::memory::{EpisodicMemory, ProceduralMemory, SemanticMemory};
use crate::session::context::{RecalledContext, SessionState};
use crate::session::state::{PhaseEvent, SessionPhase};
use crate::types::Message;

/// Sentinel that commits the session
pub const EXIT_COMMAND: &str = "exit";
/// Sentinel that discards the session
pub const EXIT_QUIET_COMMAND: &str = "exit_quiet";

/// Discrete input to the session machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Utterance(String),
    Exit,
    ExitQuiet,
}

impl SessionEvent {
    /// Classify a raw input line; blank lines carry no event
    pub fn from_input(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let event = if trimmed.eq_ignore_ascii_case(EXIT_COMMAND) {
            SessionEvent::Exit
        } else if trimmed.eq_ignore_ascii_case(EXIT_QUIET_COMMAND) {
            SessionEvent::ExitQuiet
        } else {
            SessionEvent::Utterance(trimmed.to_string())
        };
        Some(event)
    }
}

/// Episodic and procedural results of an exit, reported independently
#[derive(Debug)]
pub struct CommitReport {
    /// `Ok(None)` when the duplicate policy skipped the insert
    pub episodic: Result<Option<ConversationRecord>>,
    pub procedural: Result<GuidelineDocument>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.episodic.is_ok() && self.procedural.is_ok()
    }
}

#[derive(Debug)]
pub enum TurnOutcome {
    Reply(String),
    Committed(CommitReport),
    Discarded,
}

impl TurnOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnOutcome::Reply(_))
    }
}

pub struct SessionOrchestrator {
    completion: Arc<dyn CompletionService>,
    episodic: EpisodicMemory,
    semantic: SemanticMemory,
    procedural: ProceduralMemory,
    state: SessionState,
    phase: SessionPhase,
}

impl SessionOrchestrator {
    /// Open a session whose only turn is a system turn with no recalled match
    pub async fn start(
        completion: Arc<dyn CompletionService>,
        episodic: EpisodicMemory,
        semantic: SemanticMemory,
        procedural: ProceduralMemory,
    ) -> Self {
        let guidelines = procedural.read().await;
        let system = compose_system_prompt(None, &RecalledContext::new(), &guidelines);
        info!(model = completion.name(), "Session started");

        Self {
            completion,
            episodic,
            semantic,
            procedural,
            state: SessionState::new(system),
            phase: SessionPhase::AwaitingInput,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.state.messages
    }

    /// Apply one event
    pub async fn handle(&mut self, event: SessionEvent) -> Result<TurnOutcome> {
        match event {
            SessionEvent::Utterance(text) => {
                self.advance(PhaseEvent::UtteranceReceived)?;
                match self.run_turn(&text).await {
                    Ok(reply) => {
                        self.advance(PhaseEvent::ReplyReceived)?;
                        Ok(TurnOutcome::Reply(reply))
                    }
                    Err(e) => {
                        warn!(error = %e, phase = ?self.phase, "Turn failed");
                        self.advance(PhaseEvent::TurnFailed)?;
                        Err(e)
                    }
                }
            }
            SessionEvent::Exit => {
                self.advance(PhaseEvent::ExitRequested)?;
                Ok(TurnOutcome::Committed(self.commit().await))
            }
            SessionEvent::ExitQuiet => {
                self.advance(PhaseEvent::QuietExitRequested)?;
                self.state = SessionState::default();
                info!("Session discarded");
                Ok(TurnOutcome::Discarded)
            }
        }
    }

    /// Feed a scripted event sequence, stopping after the first terminal outcome.
    ///
    /// A failed turn is recorded and the script continues.
    pub async fn drive<I>(&mut self, events: I) -> Vec<Result<TurnOutcome>>
    where
        I: IntoIterator<Item = SessionEvent>,
    {
        let mut outcomes = Vec::new();
        for event in events {
            let outcome = self.handle(event).await;
            let terminal = matches!(&outcome, Ok(o) if o.is_terminal());
            outcomes.push(outcome);
            if terminal || self.phase.is_terminal() {
                break;
            }
        }
        outcomes
    }

    fn advance(&mut self, event: PhaseEvent) -> Result<()> {
        let next = self.phase.transition(event)?;
        debug!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    async fn run_turn(&mut self, utterance: &str) -> Result<String> {
        let recalled = self.episodic.recall(utterance).await?;
        if let Some(record) = &recalled {
            self.state.recalled = self.episodic.integrate(record, &self.state.recalled);
        }

        let guidelines = self.procedural.read().await;
        let current = recalled.as_ref().map(|r| r.conversation.as_str());
        let system = compose_system_prompt(current, &self.state.recalled, &guidelines);
        self.state.replace_system_turn(system);
        self.advance(PhaseEvent::ContextReady)?;

        let context_turn = self.semantic.build_context_message(utterance).await?;
        let user_turn = Message::human(utterance);

        let mut prompt: Vec<Message> = Vec::with_capacity(self.state.messages.len() + 2);
        prompt.extend(self.state.messages.iter().cloned());
        prompt.push(context_turn);
        prompt.push(user_turn.clone());

        let reply = self.completion.generate(&prompt).await?;
        self.state.messages.push(user_turn);
        self.state.messages.push(Message::assistant(reply.clone()));
        debug!(turns = self.state.messages.len(), "Turn complete");
        Ok(reply)
    }

    async fn commit(&mut self) -> CommitReport {
        let episodic = self.episodic.store(&self.state.messages).await;
        if let Err(e) = &episodic {
            error!(error = %e, "Episodic commit failed");
        }

        let procedural = self
            .procedural
            .update(&self.state.recalled.what_worked, &self.state.recalled.what_to_avoid)
            .await;
        if let Err(e) = &procedural {
            error!(error = %e, "Procedural update failed");
        }

        info!(
            episodic_ok = episodic.is_ok(),
            procedural_ok = procedural.is_ok(),
            "Session committed"
        );
        CommitReport { episodic, procedural }
    }
}

/// Episodic system turn for the current match and accumulated context
fn compose_system_prompt(current: Option<&str>, recalled: &RecalledContext, guidelines: &str) -> String {
    let previous = recalled.previous_conversations(current);
    episodic_system_prompt(&EpisodicPromptParts {
        current_match: current,
        previous_conversations: &previous,
        what_worked: &recalled.what_worked,
        what_to_avoid: &recalled.what_to_avoid,
        guidelines,
    })
}
