//! Error types for kbrag.
//!
//! Library code returns these typed errors; the CLI and configuration layer
//! wrap them in `anyhow`. None of them is fatal: extraction and persistence
//! failures are logged per file, and query failures are reported to the
//! caller as structured responses.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Text extraction errors. The extractor registry logs these and treats the
/// file as empty.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),

    #[error("CSV extraction failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON extraction failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// Corpus store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to persist {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read corpus at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Query path errors. Empty queries, empty corpora and low-similarity
/// results are not errors; see [`Answer`](crate::retriever::Answer).
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("corpus holds {units} units, above the configured limit of {limit}")]
    CorpusTooLarge { units: usize, limit: usize },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query worker failed: {0}")]
    Worker(String),
}
