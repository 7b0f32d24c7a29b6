//! Interactive session: state machine, in-memory state and the orchestrator
//! that fuses recalled memories into each model invocation.

pub mod context;
pub mod orchestrator;
pub mod state;

pub use context::{RecalledContext, SessionState};
pub use orchestrator::{CommitReport, SessionEvent, SessionOrchestrator, TurnOutcome};
pub use state::{PhaseEvent, SessionPhase};
