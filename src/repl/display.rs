//! Terminal output for the chat loop
//!
//! Chat text goes to stdout; diagnostics go to stderr so redirected
//! transcripts stay clean.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::errors::MemoryError;
use crate::session::CommitReport;

pub struct DisplayManager {
    spinner: Option<ProgressBar>,
    tick: Duration,
    quiet: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self {
            spinner: None,
            tick: Duration::from_millis(100),
            quiet: false,
        }
    }

    /// Suppress the banner and spinner
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn show_banner(&self, version: &str, model: &str, backend: &str) {
        if self.quiet {
            return;
        }
        let rule = "=".repeat(64);
        println!("\n{}", rule.cyan());
        println!("{}", format!("  mnemobuddy {} - memory-backed assistant", version).bold().cyan());
        println!("{}", format!("  Model: {} | Store: {}", model, backend).dimmed());
        println!("{}\n", rule.cyan());
        println!(
            "Type a message. {} saves what was learned, {} leaves without saving.\n",
            "exit".green(),
            "exit_quiet".green()
        );
    }

    /// Spinner shown while the model is working
    pub fn start_thinking(&mut self) {
        if self.quiet {
            return;
        }
        self.stop_thinking();
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Recalling and thinking...");
        pb.enable_steady_tick(self.tick);
        self.spinner = Some(pb);
    }

    pub fn stop_thinking(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    pub fn show_reply(&mut self, reply: &str) {
        self.stop_thinking();
        println!("\n{} {}\n", "assistant:".bold().green(), reply);
    }

    /// Single diagnostic line for a failed turn
    pub fn show_error(&mut self, error: &MemoryError) {
        self.stop_thinking();
        eprintln!("{} {}", "error:".bold().red(), error);
    }

    pub fn show_commit(&mut self, report: &CommitReport) {
        self.stop_thinking();
        match &report.episodic {
            Ok(Some(record)) => println!(
                "{} conversation stored ({})",
                "ok".green(),
                record.context_tags.join(", ")
            ),
            Ok(None) => println!("{} duplicate conversation skipped", "ok".green()),
            Err(e) => eprintln!("{} conversation not stored: {}", "error:".bold().red(), e),
        }
        match &report.procedural {
            Ok(doc) => println!("{} {} guidelines in effect", "ok".green(), doc.len()),
            Err(e) => eprintln!("{} guidelines not updated: {}", "error:".bold().red(), e),
        }
    }

    pub fn show_discarded(&mut self) {
        self.stop_thinking();
        println!("{}", "Session discarded; nothing was saved.".dimmed());
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}
