//! Line input for the chat loop using rustyline
//!
//! Keyboard exits map onto the session sentinels: Ctrl-D commits like `exit`,
//! Ctrl-C discards like `exit_quiet`.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::debug;

use crate::session::SessionEvent;

/// What one read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Event(SessionEvent),
    /// Blank line; ignored by the loop
    Empty,
}

pub struct InputHandler {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    prompt: String,
}

impl InputHandler {
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            history_path: None,
            prompt: prompt.into(),
        })
    }

    /// Handler backed by a history file, loaded if it already exists
    pub fn with_history(prompt: impl Into<String>, history_file: PathBuf) -> Result<Self> {
        let mut handler = Self::new(prompt)?;
        if history_file.exists() {
            if let Err(e) = handler.editor.load_history(&history_file) {
                debug!(error = %e, "Could not load input history");
            }
        }
        handler.history_path = Some(history_file);
        Ok(handler)
    }

    pub fn read(&mut self) -> Result<InputLine> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => match SessionEvent::from_input(&line) {
                Some(event) => {
                    let _ = self.editor.add_history_entry(line.trim());
                    Ok(InputLine::Event(event))
                }
                None => Ok(InputLine::Empty),
            },
            Err(ReadlineError::Eof) => Ok(InputLine::Event(SessionEvent::Exit)),
            Err(ReadlineError::Interrupted) => Ok(InputLine::Event(SessionEvent::ExitQuiet)),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }

    pub fn save_history(&mut self) -> Result<()> {
        if let Some(path) = &self.history_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.editor.save_history(path)?;
        }
        Ok(())
    }
}
