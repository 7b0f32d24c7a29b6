//! Hybrid retrieval scoring (BM25 + vector)
//!
//! ```text
//! query → [BM25 over candidates] ──┐
//!                                  ├─→ min-max normalise → alpha fusion → stable sort
//! query → [cosine over vectors]  ──┘
//! ```
//!
//! Fusion is `alpha * semantic + (1 - alpha) * lexical`. Candidates with equal
//! fused scores keep their insertion order.

use std::collections::HashMap;

/// Equal trust in semantic and lexical signal
pub const DEFAULT_ALPHA: f32 = 0.5;

/// BM25 term-frequency saturation
const BM25_K1: f32 = 1.2;
/// BM25 length normalisation
const BM25_B: f32 = 0.75;

/// One ranked candidate with its component scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    /// Position of the candidate in the input (insertion order)
    pub index: usize,
    pub semantic: f32,
    pub lexical: f32,
    pub fused: f32,
}

/// Lower-case alphanumeric terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Okapi BM25 score of every document against the query terms
pub fn bm25_scores(query_terms: &[String], documents: &[Vec<String>]) -> Vec<f32> {
    let n_docs = documents.len();
    if n_docs == 0 || query_terms.is_empty() {
        return vec![0.0; n_docs];
    }

    let total_len: usize = documents.iter().map(Vec::len).sum();
    let avg_len = total_len as f32 / n_docs as f32;
    if avg_len == 0.0 {
        return vec![0.0; n_docs];
    }

    let mut unique_terms: Vec<&String> = query_terms.iter().collect();
    unique_terms.sort();
    unique_terms.dedup();

    let doc_freq: HashMap<&str, usize> = unique_terms
        .iter()
        .map(|term| {
            let df = documents.iter().filter(|doc| doc.contains(*term)).count();
            (term.as_str(), df)
        })
        .collect();

    documents
        .iter()
        .map(|doc| {
            let doc_len = doc.len() as f32;
            unique_terms
                .iter()
                .map(|term| {
                    let tf = doc.iter().filter(|t| t == term).count() as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = doc_freq[term.as_str()] as f32;
                    let idf = (1.0 + (n_docs as f32 - df + 0.5) / (df + 0.5)).ln();
                    let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len);
                    idf * tf * (BM25_K1 + 1.0) / (tf + norm)
                })
                .sum()
        })
        .collect()
}

/// Cosine similarity; zero when either vector is empty or all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rescale to [0, 1]; a flat list maps to 1.0 if positive, else 0.0
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(max) = scores.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let min = scores.iter().copied().fold(max, f32::min);
    let range = max - min;
    if range <= f32::EPSILON {
        let flat = if max > 0.0 { 1.0 } else { 0.0 };
        return vec![flat; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Weighted combination of the two signals
pub fn fuse(alpha: f32, semantic: f32, lexical: f32) -> f32 {
    alpha * semantic + (1.0 - alpha) * lexical
}

/// Rank candidates by fused score, best first, ties in insertion order
pub fn rank(alpha: f32, pairs: &[(f32, f32)]) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = pairs
        .iter()
        .enumerate()
        .map(|(index, &(semantic, lexical))| ScoredCandidate {
            index,
            semantic,
            lexical,
            fused: fuse(alpha, semantic, lexical),
        })
        .collect();
    // Vec::sort_by is stable, so equal scores keep their input order
    scored.sort_by(|a, b| b.fused.total_cmp(&a.fused));
    scored
}

/// Normalise raw scores per signal, then rank
pub fn hybrid_rank(alpha: f32, raw_semantic: &[f32], raw_lexical: &[f32]) -> Vec<ScoredCandidate> {
    let semantic = min_max_normalize(raw_semantic);
    let lexical = min_max_normalize(raw_lexical);
    let pairs: Vec<(f32, f32)> = semantic.into_iter().zip(lexical).collect();
    rank(alpha, &pairs)
}

/// Degraded matcher: any query term occurs as a substring of the text
pub fn substring_match(query_terms: &[String], text: &str) -> bool {
    let haystack = text.to_lowercase();
    query_terms.iter().any(|term| haystack.contains(term.as_str()))
}
