//! Three-tier memory engine
//!
//! Components:
//! - Episodic Memory: past conversations with reflected lessons
//! - Semantic Memory: grounding chunks from a reference corpus
//! - Procedural Memory: bounded, self-refining guideline list
//! - Reflection Extractor: transcript to structured reflection

pub mod episodic;
pub mod procedural;
pub mod prompts;
pub mod reflection;
pub mod semantic;
pub mod transcript;
pub mod types;

pub use episodic::EpisodicMemory;
pub use procedural::{Guideline, GuidelineDocument, ProceduralMemory};
pub use reflection::{parse_reflection, ReflectionExtractor};
pub use semantic::{ChunkReport, SemanticMemory};
pub use transcript::format_conversation;
pub use types::{ConversationRecord, DocumentChunk, Reflection};
