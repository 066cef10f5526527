//! Word tokenizer used by the vectorizer.
//!
//! Text is lowercased and split on every character that is not a word
//! character (Unicode alphanumeric or `_`). Tokens shorter than
//! `min_token_chars` and tokens in the stopword set are dropped.

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
    min_token_chars: usize,
}

impl Tokenizer {
    pub fn new(stopwords: HashSet<String>, min_token_chars: usize) -> Self {
        Self {
            stopwords,
            min_token_chars: min_token_chars.max(1),
        }
    }

    /// Tokenizer with no stopwords that keeps every token.
    pub fn plain() -> Self {
        Self::new(HashSet::new(), 1)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !is_word_char(c))
            .filter(|t| !t.is_empty())
            .filter(|t| t.chars().count() >= self.min_token_chars)
            .filter(|t| !self.stopwords.contains(*t))
            .map(str::to_string)
            .collect()
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
