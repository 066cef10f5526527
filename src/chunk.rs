//! Fixed-window text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters.
//! Windows are contiguous and non-overlapping, start at offset 0, and are cut
//! purely by character count: a chunk may end mid-word or mid-sentence.
//!
//! Sizes are counted in Unicode scalar values, so a multi-byte character is
//! never split across two chunks. Each chunk is named
//! `{document_base_name}_part{N}` with `N` starting at 1, and carries a
//! SHA-256 hash of its text so unchanged chunk files can be left alone on
//! re-ingestion.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::models::Chunk;

/// Split `text` into fixed-size chunks for the document named `document_id`.
///
/// Empty or all-whitespace text yields no chunks. Callers are expected to trim
/// the text first; interior and trailing whitespace of non-blank text is kept
/// verbatim so that concatenating the chunks reproduces the input.
pub fn chunk_text(document_id: &str, text: &str, chunk_size: usize) -> Vec<Chunk> {
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let base = base_name(document_id);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chars_in_window = 0usize;

    for (offset, _) in text.char_indices() {
        if chars_in_window == chunk_size {
            chunks.push(make_chunk(document_id, &base, chunks.len(), &text[start..offset]));
            start = offset;
            chars_in_window = 0;
        }
        chars_in_window += 1;
    }

    if chars_in_window > 0 {
        chunks.push(make_chunk(document_id, &base, chunks.len(), &text[start..]));
    }

    chunks
}

/// File name without its last extension (`report.final.pdf` → `report.final`).
pub fn base_name(document_id: &str) -> String {
    Path::new(document_id)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| document_id.to_string())
}

/// Identifier of the `index`-th (zero-based) chunk of a document.
pub fn chunk_id(base: &str, index: usize) -> String {
    format!("{}_part{}", base, index + 1)
}

fn make_chunk(document_id: &str, base: &str, index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        document_id: document_id.to_string(),
        chunk_index: index,
        id: chunk_id(base, index),
        text: text.to_string(),
        hash,
    }
}
