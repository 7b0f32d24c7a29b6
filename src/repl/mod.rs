//! Interactive chat loop
//!
//! Reads lines, turns them into session events and feeds them to the
//! orchestrator until the session commits or is discarded. A failed turn
//! prints one diagnostic line and the loop keeps going.

pub mod display;
pub mod input;

use anyhow::Result;
use tracing::{debug, warn};

pub use crate::repl::display::DisplayManager;
pub use crate::repl::input::{InputHandler, InputLine};
use crate::session::{SessionEvent, SessionOrchestrator, TurnOutcome};

pub struct ChatLoop {
    input: InputHandler,
    display: DisplayManager,
}

impl ChatLoop {
    pub fn new(input: InputHandler, display: DisplayManager) -> Self {
        Self { input, display }
    }

    /// Run until a terminal outcome
    pub async fn run(&mut self, orchestrator: &mut SessionOrchestrator) -> Result<()> {
        loop {
            let event = match self.input.read()? {
                InputLine::Empty => continue,
                InputLine::Event(event) => event,
            };
            if !matches!(event, SessionEvent::Utterance(_)) {
                debug!(?event, "Exit requested");
            }
            self.display.start_thinking();

            match orchestrator.handle(event).await {
                Ok(TurnOutcome::Reply(reply)) => self.display.show_reply(&reply),
                Ok(TurnOutcome::Committed(report)) => {
                    self.display.show_commit(&report);
                    break;
                }
                Ok(TurnOutcome::Discarded) => {
                    self.display.show_discarded();
                    break;
                }
                Err(e) => self.display.show_error(&e),
            }
        }

        if let Err(e) = self.input.save_history() {
            warn!(error = %e, "Could not save input history");
        }
        Ok(())
    }
}
