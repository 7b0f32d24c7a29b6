//! Session phase state machine
//!
//! Valid transitions:
//! 1. AwaitingInput   → BuildingContext (on: UtteranceReceived)
//! 2. BuildingContext → InvokingModel   (on: ContextReady)
//! 3. InvokingModel   → AwaitingInput   (on: ReplyReceived)
//! 4. BuildingContext → AwaitingInput   (on: TurnFailed)
//! 5. InvokingModel   → AwaitingInput   (on: TurnFailed)
//! 6. AwaitingInput   → Committed       (on: ExitRequested)
//! 7. AwaitingInput   → Discarded       (on: QuietExitRequested)
//!
//! Committed and Discarded are terminal; every other pair is rejected.

use serde::{Deserialize, Serialize};

use crate::errors::{MemoryError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    AwaitingInput,
    BuildingContext,
    InvokingModel,
    /// Terminal: session flushed to episodic and procedural memory
    Committed,
    /// Terminal: session dropped without persistence
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    UtteranceReceived,
    ContextReady,
    ReplyReceived,
    TurnFailed,
    ExitRequested,
    QuietExitRequested,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Committed | SessionPhase::Discarded)
    }

    pub fn transition(&self, event: PhaseEvent) -> Result<SessionPhase> {
        use PhaseEvent::*;
        use SessionPhase::*;

        let next = match (self, event) {
            (AwaitingInput, UtteranceReceived) => BuildingContext,
            (BuildingContext, ContextReady) => InvokingModel,
            (InvokingModel, ReplyReceived) => AwaitingInput,
            (BuildingContext | InvokingModel, TurnFailed) => AwaitingInput,
            (AwaitingInput, ExitRequested) => Committed,
            (AwaitingInput, QuietExitRequested) => Discarded,
            (from, event) => {
                return Err(MemoryError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                })
            }
        };
        Ok(next)
    }
}
