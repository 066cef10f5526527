//! Corpus store: what the query path retrieves from, and where ingestion
//! writes chunks.
//!
//! Every query takes a fresh [`CorpusSnapshot`] from a [`CorpusSource`].
//! A snapshot is an ordered list of [`Unit`]s (sorted by id) plus a SHA-256
//! fingerprint over the `(id, text)` pairs, which the retriever uses to key
//! its model cache.
//!
//! Three sources are provided:
//!
//! - [`ChunkDirectory`]: the `*.txt` chunk files written by ingestion.
//! - [`DocumentDirectory`]: every supported source document, extracted on
//!   each snapshot.
//! - [`InMemoryCorpus`]: units held in memory, for embedding and tests.
//!
//! Chunk files are written with [`persist_chunk`], which goes through a
//! temporary file in the same directory and an atomic rename, so a reader
//! never observes a partially written chunk.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::KnowledgeConfig;
use crate::error::StoreError;
use crate::extract::ExtractorRegistry;
use crate::models::{Chunk, Unit};
use crate::sources::scan_sources;

/// Point-in-time copy of the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSnapshot {
    pub units: Vec<Unit>,
    /// Hex SHA-256 over every `(id, text)` pair, in order.
    pub fingerprint: String,
}

impl CorpusSnapshot {
    /// Sorts `units` by id and computes the fingerprint.
    pub fn new(mut units: Vec<Unit>) -> Self {
        units.sort_by(|a, b| a.id.cmp(&b.id));
        let mut hasher = Sha256::new();
        for unit in &units {
            hasher.update(unit.id.as_bytes());
            hasher.update([0u8]);
            hasher.update(unit.text.as_bytes());
            hasher.update([0u8]);
        }
        let fingerprint = format!("{:x}", hasher.finalize());
        Self { units, fingerprint }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Anything the retriever can snapshot.
pub trait CorpusSource: Send + Sync {
    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError>;
}

/// Chunk files in a single directory. Unit ids are file names
/// (`manual_part3.txt`). A missing directory is an empty corpus.
#[derive(Debug, Clone)]
pub struct ChunkDirectory {
    dir: PathBuf,
}

impl ChunkDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CorpusSource for ChunkDirectory {
    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        let read_err = |source| StoreError::Read {
            path: self.dir.clone(),
            source,
        };

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CorpusSnapshot::new(Vec::new()))
            }
            Err(e) => return Err(read_err(e)),
        };

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            // Leading dot: hidden files and in-flight temp files.
            if name.starts_with('.') || !name.ends_with(".txt") {
                continue;
            }
            if !entry.file_type().map_err(read_err)?.is_file() {
                continue;
            }

            let path = entry.path();
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                // Removed between listing and reading.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(source) => return Err(StoreError::Read { path, source }),
            };
            units.push(Unit::new(name, String::from_utf8_lossy(&bytes)));
        }

        Ok(CorpusSnapshot::new(units))
    }
}

/// Source documents under the knowledge root, extracted on every snapshot.
/// Unit ids are `/`-separated paths relative to the root. Files without a
/// registered extractor are left out.
pub struct DocumentDirectory {
    knowledge: KnowledgeConfig,
    registry: Arc<ExtractorRegistry>,
}

impl DocumentDirectory {
    pub fn new(knowledge: KnowledgeConfig, registry: Arc<ExtractorRegistry>) -> Self {
        Self {
            knowledge,
            registry,
        }
    }
}

impl CorpusSource for DocumentDirectory {
    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        if !self.knowledge.root.exists() {
            return Ok(CorpusSnapshot::new(Vec::new()));
        }

        let scan = scan_sources(&self.knowledge).map_err(|e| StoreError::Read {
            path: self.knowledge.root.clone(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let units = scan
            .files
            .into_iter()
            .filter(|f| self.registry.supports(&f.path))
            .map(|f| {
                let text = self.registry.extract(&f.path);
                Unit::new(f.relative, text)
            })
            .collect();

        Ok(CorpusSnapshot::new(units))
    }
}

/// Units held in memory behind a lock.
#[derive(Debug, Default)]
pub struct InMemoryCorpus {
    units: RwLock<BTreeMap<String, String>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units<I, K, V>(units: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let corpus = Self::new();
        for (id, text) in units {
            corpus.insert(id, text);
        }
        corpus
    }

    /// Add or replace a unit.
    pub fn insert(&self, id: impl Into<String>, text: impl Into<String>) {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), text.into());
    }

    pub fn remove(&self, id: &str) -> bool {
        self.units
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CorpusSource for InMemoryCorpus {
    fn snapshot(&self) -> Result<CorpusSnapshot, StoreError> {
        let units = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, text)| Unit::new(id.clone(), text.clone()))
            .collect();
        Ok(CorpusSnapshot::new(units))
    }
}

/// What [`persist_chunk`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// The file already held exactly this text.
    Unchanged,
}

/// Write `chunk` to `{dir}/{chunk.id}.txt` atomically.
pub fn persist_chunk(dir: &Path, chunk: &Chunk) -> Result<PersistOutcome, StoreError> {
    let path = dir.join(chunk.file_name());

    if let Ok(existing) = std::fs::read(&path) {
        if existing == chunk.text.as_bytes() {
            return Ok(PersistOutcome::Unchanged);
        }
    }

    let persist_err = |source| StoreError::Persist {
        path: path.clone(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".chunk")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(persist_err)?;
    tmp.write_all(chunk.text.as_bytes()).map_err(persist_err)?;
    tmp.as_file().sync_all().map_err(persist_err)?;
    tmp.persist(&path).map_err(|e| persist_err(e.error))?;

    Ok(PersistOutcome::Written)
}

/// Delete `{base}_part{N}.txt` files in `dir` with `N > keep`, left over from
/// a longer previous version of the same document. Returns how many files
/// were removed.
pub fn remove_stale_chunks(dir: &Path, base: &str, keep: usize) -> Result<usize, StoreError> {
    let read_err = |source| StoreError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(read_err(e)),
    };

    let prefix = format!("{}_part", base);
    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name().to_string_lossy().to_string();
        let part = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".txt"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(n) = part {
            if n > keep {
                let path = entry.path();
                std::fs::remove_file(&path)
                    .map_err(|source| StoreError::Persist { path, source })?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}
