//! mnemobuddy - conversational memory engine
//!
//! A chat assistant that remembers past conversations (episodic memory),
//! grounds answers in a document corpus (semantic memory) and keeps refining a
//! short list of behavioural guidelines (procedural memory).
//!
//! # Architecture
//!
//! - **memory**: the three tiers plus reflection extraction
//! - **session**: state machine and orchestrator fusing memories into prompts
//! - **store**: pluggable record stores with hybrid BM25 + vector retrieval
//! - **llm** / **embedding**: completion and embedding adapters

pub mod errors;
pub mod types;
pub mod config;
pub mod persist;

pub use errors::{MemoryError, Result};

// External collaborators
pub mod llm;
pub mod embedding;
pub mod store;

// Memory engine
pub mod memory;
pub mod session;
pub mod engine;

// Outer surfaces
pub mod ingest;
pub mod cli;
pub mod doctor;
pub mod repl;
