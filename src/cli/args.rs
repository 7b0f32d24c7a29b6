//! Command-line argument parsing
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, StoreBackend};

/// mnemobuddy - a chat assistant with episodic, semantic and procedural memory
#[derive(Parser, Debug)]
#[command(name = "mnemobuddy")]
#[command(version)]
#[command(about = "Chat assistant that remembers conversations and refines its own guidelines", long_about = None)]
pub struct Args {
    /// Configuration file path (default ~/.mnemobuddy/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Completion model, overriding the configuration file
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Memory store backend, overriding the configuration file
    #[arg(long, value_enum, global = true)]
    pub backend: Option<BackendArg>,

    /// Verbosity level: -v (info), -vv (debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only, no banner or spinner)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// Split a text file into chunks and add them to semantic memory
    Ingest {
        /// UTF-8 text file to ingest
        file: PathBuf,

        /// Maximum characters per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared between consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Print the current procedural guidelines
    Guidelines,

    /// Show what memory would recall for a query
    Recall {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Check completion service, embedder and store reachability
    Doctor,

    /// Display the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Local,
    Qdrant,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Local => StoreBackend::Local,
            BackendArg::Qdrant => StoreBackend::Qdrant,
        }
    }
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "mnemobuddy=error",
            Verbosity::Normal => "mnemobuddy=warn",
            Verbosity::Verbose => "mnemobuddy=info",
            Verbosity::VeryVerbose => "mnemobuddy=debug",
        }
    }
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Subcommand to run; a bare invocation chats
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat)
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(backend) = self.backend {
            config.store.backend = backend.into();
        }
        if let Some(Commands::Ingest { chunk_size, overlap, .. }) = &self.command {
            if let Some(size) = chunk_size {
                config.ingest.chunk_size = *size;
            }
            if let Some(overlap) = overlap {
                config.ingest.chunk_overlap = *overlap;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_chats() {
        let args = Args::parse_from(["mnemobuddy"]);
        assert_eq!(args.command(), Commands::Chat);
        assert_eq!(args.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(Args::parse_from(["mnemobuddy", "-v"]).verbosity(), Verbosity::Verbose);
        assert_eq!(Args::parse_from(["mnemobuddy", "-vv"]).verbosity(), Verbosity::VeryVerbose);
        assert_eq!(Args::parse_from(["mnemobuddy", "-q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(Verbosity::Normal.log_filter(), "mnemobuddy=warn");
    }

    #[test]
    fn test_recall_joins_words() {
        let args = Args::parse_from(["mnemobuddy", "recall", "lose", "weight"]);
        match args.command() {
            Commands::Recall { query } => assert_eq!(query.join(" "), "lose weight"),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "mnemobuddy",
            "--model",
            "gpt-4o",
            "--backend",
            "qdrant",
            "ingest",
            "notes.txt",
            "--chunk-size",
            "400",
        ]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.store.backend, StoreBackend::Qdrant);
        assert_eq!(config.ingest.chunk_size, 400);
        assert_eq!(config.ingest.chunk_overlap, 0);
    }
}
