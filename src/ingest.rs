//! Document ingestion: recursive character splitting
//!
//! Text is split on the coarsest separator present (paragraphs, then lines,
//! then sentence punctuation, then words, then characters). Pieces that fit
//! are merged greedily up to `chunk_size` characters; oversized pieces are
//! split again with the next finer separator. Separators stay attached to the
//! start of the piece that follows them.

use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

use crate::errors::{MemoryError, Result};

pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ".", "?", "!", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(MemoryError::Config("chunk_size must be at least 1".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(MemoryError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(s.as_str()))
            .map(|(i, s)| (i, s.as_str()))
            .unwrap_or((separators.len(), ""));
        let finer = separators.get(index + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }
        chunks
    }

    /// Greedily join pieces into chunks of at most `chunk_size` characters
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_chunk(&mut chunks, &window);
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, prefixing every piece after the first with it
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 { part.to_string() } else { format!("{}{}", separator, part) };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

/// Read a UTF-8 text file and split it into chunks
pub fn chunk_file(path: &Path, splitter: &TextSplitter) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let chunks = splitter.split(&text);
    info!(path = %path.display(), chars = char_len(&text), chunks = chunks.len(), "Chunked document");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use tempfile::TempDir;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::new(800, 0).unwrap();
        assert_eq!(splitter.split("  Protein helps recovery.  "), vec!["Protein helps recovery."]);
        assert!(splitter.split("   ").is_empty());
    }

    #[test]
    fn test_paragraphs_split_first() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let text = "Squats build the legs well.\n\nRows build the back nicely.";
        assert_eq!(
            splitter.split(text),
            vec!["Squats build the legs well.", "Rows build the back nicely."]
        );
    }

    #[test]
    fn test_long_word_falls_back_to_characters() {
        let splitter = TextSplitter::new(4, 0).unwrap();
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let splitter = TextSplitter::new(11, 6).unwrap();
        let chunks = splitter.split("one two three four");
        assert!(chunks.len() >= 2);
        assert!(chunks[1].starts_with("two") || chunks[1].starts_with("three"));
    }

    #[test]
    fn test_invalid_sizes() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(10, 10).is_err());
    }

    #[quickcheck]
    fn prop_chunks_respect_size(text: String) -> bool {
        let splitter = TextSplitter::new(50, 0).unwrap();
        splitter.split(&text).iter().all(|c| char_len(c) <= 50)
    }

    #[test]
    fn test_chunk_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "Hydrate often.\n\nSleep eight hours.").unwrap();

        let splitter = TextSplitter::new(800, 0).unwrap();
        let chunks = chunk_file(&path, &splitter).unwrap();
        assert_eq!(chunks, vec!["Hydrate often.\n\nSleep eight hours."]);
    }
}
