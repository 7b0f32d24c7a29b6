//! Type definitions module
//!
//! Conversation turns shared by the completion service, the session loop and
//! the memory managers.

pub mod messages;

// Re-export commonly used types
pub use messages::{Message, Role};
