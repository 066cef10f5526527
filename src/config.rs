//! TOML configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below,
//! which reproduce the classic setup: a `knowledge_base/` directory, chunk
//! files under `knowledge_base/base/`, 500-character chunks, TF-IDF with
//! Portuguese stopwords, and a 0.1 relevance threshold.
//!
//! ```toml
//! [knowledge]
//! root = "./knowledge_base"
//! output_dir = "base"
//!
//! [chunking]
//! chunk_size = 500
//!
//! [retrieval]
//! corpus = "chunks"
//! weighting = "tfidf"
//! threshold = 0.1
//!
//! [server]
//! bind = "0.0.0.0:5000"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::stopwords;
use crate::vectorize::Weighting;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Directory holding the source documents.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Where chunk files are written. Relative paths resolve against `root`.
    /// This directory is never ingested.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            output_dir: default_output_dir(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl KnowledgeConfig {
    /// Absolute-or-root-relative location of the chunk directory.
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.root.join(&self.output_dir)
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./knowledge_base")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("base")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}

/// Which units the query path compares against.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorpusMode {
    /// Chunk files in the output directory.
    #[default]
    Chunks,
    /// Every supported source document, extracted on each query.
    Documents,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub corpus: CorpusMode,
    #[serde(default)]
    pub weighting: Weighting,
    /// A match needs a cosine score strictly above this value.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Leading characters of the matched unit returned as the answer.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    #[serde(default = "default_min_token_chars")]
    pub min_token_chars: usize,
    #[serde(default = "default_stopwords")]
    pub stopwords: String,
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
    /// Queries fail instead of vectorizing a corpus larger than this.
    #[serde(default = "default_max_units")]
    pub max_units: usize,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusMode::default(),
            weighting: Weighting::default(),
            threshold: default_threshold(),
            excerpt_chars: default_excerpt_chars(),
            min_token_chars: default_min_token_chars(),
            stopwords: default_stopwords(),
            extra_stopwords: Vec::new(),
            max_units: default_max_units(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_threshold() -> f64 {
    0.1
}
fn default_excerpt_chars() -> usize {
    500
}
fn default_min_token_chars() -> usize {
    2
}
fn default_stopwords() -> String {
    "portuguese".to_string()
}
fn default_max_units() -> usize {
    50_000
}
fn default_query_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    /// Send PDF pages without embedded text through `pdftoppm` + `tesseract`.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: PathBuf,
    #[serde(default = "default_tesseract")]
    pub tesseract: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            language: default_ocr_language(),
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
        }
    }
}

fn default_ocr_language() -> String {
    "por".to_string()
}
fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}
fn default_tesseract() -> PathBuf {
    PathBuf::from("tesseract")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Configuration rooted at `root`, otherwise default.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.knowledge.root = root.into();
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }

        let r = &self.retrieval;
        if !(0.0..1.0).contains(&r.threshold) {
            anyhow::bail!("retrieval.threshold must be in [0.0, 1.0)");
        }
        if r.excerpt_chars == 0 {
            anyhow::bail!("retrieval.excerpt_chars must be > 0");
        }
        if r.min_token_chars == 0 {
            anyhow::bail!("retrieval.min_token_chars must be > 0");
        }
        if r.max_units == 0 {
            anyhow::bail!("retrieval.max_units must be > 0");
        }
        if r.query_timeout_secs == 0 {
            anyhow::bail!("retrieval.query_timeout_secs must be > 0");
        }
        if stopwords::for_language(&r.stopwords).is_none() {
            anyhow::bail!(
                "Unknown stopword language: '{}'. Must be one of: {}.",
                r.stopwords,
                stopwords::SUPPORTED_LANGUAGES.join(", ")
            );
        }

        if self.ocr.enabled && self.ocr.language.trim().is_empty() {
            anyhow::bail!("ocr.language must not be empty when OCR is enabled");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
/// A file that exists but fails to parse or validate is still an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(
            path = %path.display(),
            "config file not found, using defaults"
        );
        Ok(Config::minimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.retrieval.threshold, 0.1);
        assert_eq!(config.retrieval.excerpt_chars, 500);
        assert_eq!(config.retrieval.corpus, CorpusMode::Chunks);
        assert_eq!(config.retrieval.weighting, Weighting::TfIdf);
        assert_eq!(config.retrieval.stopwords, "portuguese");
        assert_eq!(
            config.knowledge.output_path(),
            PathBuf::from("./knowledge_base").join("base")
        );
        assert!(!config.ocr.enabled);
    }

    #[test]
    fn test_full_config_parses() {
        let config = parse_config(
            r#"
[knowledge]
root = "/srv/kb"
output_dir = "/srv/chunks"
exclude_globs = ["**/*.tmp"]

[chunking]
chunk_size = 300

[retrieval]
corpus = "documents"
weighting = "tf"
threshold = 0.0
excerpt_chars = 300
stopwords = "none"
extra_stopwords = ["empresa"]

[ocr]
enabled = true
language = "por+eng"

[server]
bind = "127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.knowledge.output_path(), PathBuf::from("/srv/chunks"));
        assert_eq!(config.chunking.chunk_size, 300);
        assert_eq!(config.retrieval.corpus, CorpusMode::Documents);
        assert_eq!(config.retrieval.weighting, Weighting::Tf);
        assert_eq!(config.retrieval.extra_stopwords, vec!["empresa"]);
        assert_eq!(config.ocr.language, "por+eng");
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        assert!(parse_config("[retrieval]\nthreshold = 1.0\n").is_err());
        assert!(parse_config("[retrieval]\nthreshold = -0.5\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_stopword_language() {
        let err = parse_config("[retrieval]\nstopwords = \"klingon\"\n").unwrap_err();
        assert!(err.to_string().contains("klingon"));
    }

    #[test]
    fn test_rejects_unknown_weighting() {
        assert!(parse_config("[retrieval]\nweighting = \"bm25\"\n").is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config = load_or_default(Path::new("/definitely/not/here/kb.toml")).unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
    }
}
