use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::KnowledgeConfig;

/// A candidate document found under the knowledge root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated on every platform.
    pub relative: String,
    pub file_name: String,
}

/// Result of walking the knowledge root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceScan {
    pub files: Vec<SourceFile>,
    /// Entries the walk could not read (dangling symlinks, unreadable
    /// directories, symlink loops). Each one is logged and skipped.
    pub unreadable: usize,
}

/// Walk the knowledge root and list every regular file, sorted by relative
/// path. The chunk output directory is never descended into.
///
/// Only a missing root or an invalid exclude glob is an error; an entry that
/// cannot be read is counted in [`SourceScan::unreadable`].
pub fn scan_sources(config: &KnowledgeConfig) -> Result<SourceScan> {
    let root = &config.root;
    if !root.exists() {
        bail!("Knowledge root does not exist: {}", root.display());
    }

    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let output = canonical_or_self(&config.output_path());

    let mut files = Vec::new();
    let mut unreadable = 0;
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && canonical_or_self(e.path()) == output));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                warn!(path = %path, error = %e, "skipping unreadable entry");
                unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        files.push(SourceFile {
            path: path.to_path_buf(),
            relative: rel_str,
            file_name,
        });
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.relative.cmp(&b.relative));

    Ok(SourceScan { files, unreadable })
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
