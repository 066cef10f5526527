//! Bag-of-words vectorizer with TF or TF-IDF weighting.
//!
//! [`Vectorizer::fit`] builds a vocabulary from a corpus and computes
//! per-term inverse document frequencies; [`Vectorizer::transform`] maps any
//! text onto that vocabulary as an L2-normalized [`SparseVector`].
//!
//! # Weighting
//!
//! - `tf`: raw term counts.
//! - `tfidf`: term count × smoothed IDF, where
//!   `idf(t) = ln((1 + n) / (1 + df(t))) + 1` for a corpus of `n` texts.
//!   Terms that occur in more texts get lower weight; no term ever gets
//!   zero or negative weight.
//!
//! The vocabulary is sorted, so term indices (and therefore every vector)
//! depend only on corpus contents. Terms the model has never seen are
//! dropped from transformed vectors.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::tokenize::Tokenizer;

/// Term weighting scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    Tf,
    #[default]
    TfIdf,
}

/// Sparse vector of `(term index, weight)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Build from unsorted pairs. Zero weights are dropped and duplicate
    /// indices are summed.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
        for (i, w) in pairs {
            *merged.entry(i).or_insert(0.0) += w;
        }
        Self {
            entries: merged.into_iter().filter(|(_, w)| *w != 0.0).collect(),
        }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }

    /// Dot product by merging the two sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            for (_, w) in &mut self.entries {
                *w /= norm;
            }
        }
        self
    }
}

/// Vocabulary and IDF table produced by [`Vectorizer::fit`].
#[derive(Debug, Clone)]
pub struct FittedModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    weighting: Weighting,
    documents: usize,
}

impl FittedModel {
    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    /// Number of texts the model was fit on.
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn term_index(&self, term: &str) -> Option<usize> {
        self.vocabulary.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_index(term).map(|i| self.idf[i])
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }
}

#[derive(Debug, Clone)]
pub struct Vectorizer {
    tokenizer: Tokenizer,
    weighting: Weighting,
}

impl Vectorizer {
    pub fn new(tokenizer: Tokenizer, weighting: Weighting) -> Self {
        Self {
            tokenizer,
            weighting,
        }
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Build the vocabulary and IDF table for `corpus`.
    pub fn fit<S: AsRef<str>>(&self, corpus: &[S]) -> FittedModel {
        let tokenized: Vec<Vec<String>> = corpus
            .iter()
            .map(|t| self.tokenizer.tokenize(t.as_ref()))
            .collect();
        self.fit_tokens(&tokenized)
    }

    /// Fit on `corpus` and transform every text in it, tokenizing once.
    pub fn fit_transform<S: AsRef<str>>(&self, corpus: &[S]) -> (FittedModel, Vec<SparseVector>) {
        let tokenized: Vec<Vec<String>> = corpus
            .iter()
            .map(|t| self.tokenizer.tokenize(t.as_ref()))
            .collect();
        let model = self.fit_tokens(&tokenized);
        let vectors = tokenized
            .iter()
            .map(|tokens| weigh(&model, tokens))
            .collect();
        (model, vectors)
    }

    /// Map `text` onto the model's vocabulary.
    pub fn transform(&self, model: &FittedModel, text: &str) -> SparseVector {
        weigh(model, &self.tokenizer.tokenize(text))
    }

    fn fit_tokens(&self, tokenized: &[Vec<String>]) -> FittedModel {
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in tokenized {
            let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in distinct {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n = tokenized.len() as f64;
        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        // BTreeMap iteration is sorted, which fixes the term indices.
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        FittedModel {
            vocabulary,
            idf,
            weighting: self.weighting,
            documents: tokenized.len(),
        }
    }
}

fn weigh(model: &FittedModel, tokens: &[String]) -> SparseVector {
    let mut counts: HashMap<usize, f64> = HashMap::new();
    for token in tokens {
        if let Some(index) = model.term_index(token) {
            *counts.entry(index).or_insert(0.0) += 1.0;
        }
    }

    let pairs = counts.into_iter().map(|(index, tf)| match model.weighting {
        Weighting::Tf => (index, tf),
        Weighting::TfIdf => (index, tf * model.idf[index]),
    });
    SparseVector::from_pairs(pairs).normalized()
}
