//! Core data models used throughout kbrag.
//!
//! These types represent the chunks and retrievable units that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

/// A fixed-size slice of a document's text, stored as its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the source document the chunk was cut from.
    pub document_id: String,
    /// Zero-based position of the chunk within its document.
    pub chunk_index: usize,
    /// `{base_name}_part{chunk_index + 1}`.
    pub id: String,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// File name the chunk is persisted under.
    pub fn file_name(&self) -> String {
        format!("{}.txt", self.id)
    }
}

/// One entry of the corpus as seen by the query path: a chunk file or a
/// whole document, keyed by a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub id: String,
    pub text: String,
}

impl Unit {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}
