//! Error types for the memory engine
//!
//! One enum covers the whole crate. Retrieval misses are not errors: recall
//! operations return `Option` or an empty string instead.

use thiserror::Error;

/// Main error type for the memory subsystem
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Completion output could not be parsed into a reflection
    #[error("Malformed reflection: {0}")]
    MalformedReflection(String),

    /// A write was rejected by the backing store
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Memory store, embedder or completion service could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Session state machine transition errors
    #[error("Invalid state transition from {from} via {event}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// Embedding generation errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Keyword index errors
    #[error("Keyword index error: {0}")]
    KeywordIndex(#[from] tantivy::TantivyError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Memory error: {0}")]
    Generic(String),
}

impl MemoryError {
    /// Whether the error aborts the current conversational turn.
    ///
    /// Persistence and reflection failures only happen at commit time and are
    /// reported without ending the session.
    pub fn is_turn_fatal(&self) -> bool {
        !matches!(
            self,
            MemoryError::Persistence(_) | MemoryError::MalformedReflection(_)
        )
    }

    pub(crate) fn unavailable(what: &str, err: impl std::fmt::Display) -> Self {
        MemoryError::BackendUnavailable(format!("{}: {}", what, err))
    }
}

/// Result type alias for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Convert anyhow errors to MemoryError
impl From<anyhow::Error> for MemoryError {
    fn from(err: anyhow::Error) -> Self {
        MemoryError::Generic(err.to_string())
    }
}
