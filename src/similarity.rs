//! Cosine similarity and single-best-match resolution.
//!
//! [`resolve`] scans the corpus vectors in order and keeps the first unit
//! with the highest score: a later unit replaces the current best only when
//! its score is strictly greater. A match is reported only when that best
//! score is strictly greater than the threshold, so a score equal to the
//! threshold is "no relevant match".

use crate::vectorize::SparseVector;

/// Cosine similarity in `[0.0, 1.0]`.
///
/// Returns exactly `0.0` when either vector has zero norm. The result is
/// clamped to absorb floating-point drift above `1.0`; term vectors have no
/// negative weights, so the lower bound never changes a real score.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(0.0, 1.0)
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Position of the best unit in the corpus and its score.
    Match { index: usize, score: f64 },
    /// The best score did not clear the threshold. `best_score` is `0.0`
    /// for an empty corpus.
    NoMatch { best_score: f64 },
}

/// Pick the corpus vector most similar to `query`.
pub fn resolve(query: &SparseVector, corpus: &[SparseVector], threshold: f64) -> Resolution {
    let mut best: Option<(usize, f64)> = None;
    for (index, vector) in corpus.iter().enumerate() {
        let score = cosine_similarity(query, vector);
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((index, score)),
        }
    }

    match best {
        Some((index, score)) if score > threshold => Resolution::Match { index, score },
        Some((_, score)) => Resolution::NoMatch { best_score: score },
        None => Resolution::NoMatch { best_score: 0.0 },
    }
}
