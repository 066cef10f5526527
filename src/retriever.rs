//! Query entry point.
//!
//! A [`Retriever`] answers one free-text question with the single most
//! similar unit of the corpus:
//!
//! 1. Blank queries are answered with [`Answer::EmptyQuery`] before any I/O.
//! 2. The corpus source is snapshotted. An empty snapshot is
//!    [`Answer::EmptyCorpus`]; one above `max_units` fails with
//!    [`QueryError::CorpusTooLarge`].
//! 3. The vectorizer is fit on the snapshot, or the cached fit is reused
//!    when the snapshot fingerprint is unchanged.
//! 4. The query is vectorized and resolved against the corpus vectors.
//!
//! [`Answer`] renders to the user-facing messages shown by the CLI and the
//! HTTP server.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Config, CorpusMode, RetrievalConfig};
use crate::error::QueryError;
use crate::extract::ExtractorRegistry;
use crate::similarity::{resolve, Resolution};
use crate::stopwords;
use crate::store::{ChunkDirectory, CorpusSnapshot, CorpusSource, DocumentDirectory};
use crate::tokenize::Tokenizer;
use crate::vectorize::{FittedModel, SparseVector, Vectorizer};

pub const EMPTY_QUERY_MESSAGE: &str = "Por favor, digite uma mensagem.";
pub const EMPTY_CORPUS_MESSAGE: &str =
    "Base de conhecimento vazia. Por favor, adicione documentos.";
pub const NO_MATCH_MESSAGE: &str = "Desculpe, não encontrei uma resposta relevante.";

/// Result of a query. None of these is an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    EmptyQuery,
    EmptyCorpus,
    NoMatch {
        best_score: f64,
    },
    Match {
        id: String,
        score: f64,
        /// Leading `excerpt_chars` characters of the unit.
        excerpt: String,
    },
}

impl Answer {
    pub fn is_match(&self) -> bool {
        matches!(self, Answer::Match { .. })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::EmptyQuery => f.write_str(EMPTY_QUERY_MESSAGE),
            Answer::EmptyCorpus => f.write_str(EMPTY_CORPUS_MESSAGE),
            Answer::NoMatch { .. } => f.write_str(NO_MATCH_MESSAGE),
            Answer::Match { id, excerpt, .. } => write!(f, "[{}] {}...", id, excerpt),
        }
    }
}

/// Model fit on one corpus snapshot.
struct FittedIndex {
    fingerprint: String,
    model: FittedModel,
    vectors: Vec<SparseVector>,
}

pub struct Retriever {
    source: Arc<dyn CorpusSource>,
    vectorizer: Vectorizer,
    threshold: f64,
    excerpt_chars: usize,
    max_units: usize,
    timeout: Duration,
    cache: Mutex<Option<Arc<FittedIndex>>>,
}

impl Retriever {
    pub fn new(source: Arc<dyn CorpusSource>, config: &RetrievalConfig) -> Self {
        let tokenizer = Tokenizer::new(
            stopwords::build_set(&config.stopwords, &config.extra_stopwords),
            config.min_token_chars,
        );
        Self {
            source,
            vectorizer: Vectorizer::new(tokenizer, config.weighting),
            threshold: config.threshold,
            excerpt_chars: config.excerpt_chars,
            max_units: config.max_units,
            timeout: Duration::from_secs(config.query_timeout_secs),
            cache: Mutex::new(None),
        }
    }

    /// Retriever over the corpus selected by `retrieval.corpus`.
    pub fn from_config(config: &Config, registry: Arc<ExtractorRegistry>) -> Self {
        let source: Arc<dyn CorpusSource> = match config.retrieval.corpus {
            CorpusMode::Chunks => Arc::new(ChunkDirectory::new(config.knowledge.output_path())),
            CorpusMode::Documents => {
                Arc::new(DocumentDirectory::new(config.knowledge.clone(), registry))
            }
        };
        Self::new(source, &config.retrieval)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Answer `query` synchronously.
    pub fn answer(&self, query: &str) -> Result<Answer, QueryError> {
        if query.trim().is_empty() {
            warn!("empty query");
            return Ok(Answer::EmptyQuery);
        }

        let snapshot = self.source.snapshot()?;
        if snapshot.is_empty() {
            info!("knowledge base is empty");
            return Ok(Answer::EmptyCorpus);
        }
        if snapshot.len() > self.max_units {
            return Err(QueryError::CorpusTooLarge {
                units: snapshot.len(),
                limit: self.max_units,
            });
        }

        let index = self.fitted(&snapshot);
        let query_vector = self.vectorizer.transform(&index.model, query);

        match resolve(&query_vector, &index.vectors, self.threshold) {
            Resolution::Match { index, score } => {
                let unit = &snapshot.units[index];
                info!(id = %unit.id, score, "match found");
                Ok(Answer::Match {
                    id: unit.id.clone(),
                    score,
                    excerpt: unit.text.chars().take(self.excerpt_chars).collect(),
                })
            }
            Resolution::NoMatch { best_score } => {
                info!(best_score, threshold = self.threshold, "no relevant match");
                Ok(Answer::NoMatch { best_score })
            }
        }
    }

    /// Run [`answer`](Self::answer) on the blocking pool, bounded by the
    /// configured query timeout.
    pub async fn answer_with_timeout(self: &Arc<Self>, query: String) -> Result<Answer, QueryError> {
        let retriever = Arc::clone(self);
        let limit = self.timeout;
        let task = tokio::task::spawn_blocking(move || retriever.answer(&query));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(QueryError::Worker(join_err.to_string())),
            Err(_) => {
                warn!(timeout = ?limit, "query timed out");
                Err(QueryError::Timeout(limit))
            }
        }
    }

    /// Cached fit for `snapshot`, fitting on a miss. The lock is held only
    /// to look up and to store, so concurrent misses fit in parallel and the
    /// last one to finish is cached.
    fn fitted(&self, snapshot: &CorpusSnapshot) -> Arc<FittedIndex> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(index) = cached {
            if index.fingerprint == snapshot.fingerprint {
                debug!(units = snapshot.len(), "model cache hit");
                return index;
            }
        }

        debug!(units = snapshot.len(), "model cache miss, fitting");
        let texts: Vec<&str> = snapshot.units.iter().map(|u| u.text.as_str()).collect();
        let (model, vectors) = self.vectorizer.fit_transform(&texts);
        debug!(vocabulary = model.vocabulary_len(), "model fit");
        let index = Arc::new(FittedIndex {
            fingerprint: snapshot.fingerprint.clone(),
            model,
            vectors,
        });
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        index
    }
}
