//! Ingestion pipeline orchestration.
//!
//! Walks the knowledge root, extracts each supported document, trims and
//! chunks the text, and persists every chunk as a file in the output
//! directory. A failure on one file is logged and counted; it never stops the
//! batch. Re-running on unchanged input rewrites nothing.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::chunk::{base_name, chunk_text};
use crate::config::Config;
use crate::extract::ExtractorRegistry;
use crate::sources::{scan_sources, SourceFile};
use crate::store::{persist_chunk, remove_stale_chunks, PersistOutcome};

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_seen: usize,
    /// Walk entries that could not be read, such as dangling symlinks.
    pub entries_unreadable: usize,
    pub files_chunked: usize,
    /// No extractor registered for the extension.
    pub files_unsupported: usize,
    /// Extraction produced no text (including extraction failures).
    pub files_empty: usize,
    /// At least one chunk of the file could not be persisted.
    pub files_failed: usize,
    pub chunks_written: usize,
    pub chunks_unchanged: usize,
    /// Chunk files left over from a longer previous version of a document.
    /// Files that share a base name (`rh/manual.txt`, `ti/manual.txt`)
    /// share chunk ids, so only parts beyond the longest of them count.
    pub chunks_removed: usize,
}

impl IngestReport {
    pub fn chunks_total(&self) -> usize {
        self.chunks_written + self.chunks_unchanged
    }
}

/// Ingest everything under `config.knowledge.root`.
///
/// With `dry_run` nothing is written; chunks that would be written are
/// counted in `chunks_written`.
pub fn run_ingest(
    config: &Config,
    registry: &ExtractorRegistry,
    dry_run: bool,
) -> Result<IngestReport> {
    let scan = scan_sources(&config.knowledge)?;
    let files = scan.files;

    let output = config.knowledge.output_path();
    if !dry_run {
        std::fs::create_dir_all(&output).with_context(|| {
            format!("Failed to create output directory: {}", output.display())
        })?;
    }
    info!(
        root = %config.knowledge.root.display(),
        files = files.len(),
        dry_run,
        "ingestion started"
    );

    let mut report = IngestReport {
        entries_unreadable: scan.unreadable,
        ..IngestReport::default()
    };
    // Chunk count to keep per base name; `None` once any file with that
    // base failed to persist, so its old chunks are left alone.
    let mut keep: BTreeMap<String, Option<usize>> = BTreeMap::new();
    for file in &files {
        report.files_seen += 1;
        ingest_file(config, registry, file, dry_run, &mut report, &mut keep);
    }

    if !dry_run {
        remove_stale(&output, &keep, &mut report);
    }

    info!(
        files_seen = report.files_seen,
        entries_unreadable = report.entries_unreadable,
        files_chunked = report.files_chunked,
        files_unsupported = report.files_unsupported,
        files_empty = report.files_empty,
        files_failed = report.files_failed,
        chunks_written = report.chunks_written,
        chunks_unchanged = report.chunks_unchanged,
        chunks_removed = report.chunks_removed,
        "ingestion finished"
    );

    Ok(report)
}

fn ingest_file(
    config: &Config,
    registry: &ExtractorRegistry,
    file: &SourceFile,
    dry_run: bool,
    report: &mut IngestReport,
    keep: &mut BTreeMap<String, Option<usize>>,
) {
    if !registry.supports(&file.path) {
        warn!(file = %file.relative, "unsupported file format, skipping");
        report.files_unsupported += 1;
        return;
    }

    info!(file = %file.relative, "processing");
    let text = registry.extract(&file.path);
    let text = text.trim();
    if text.is_empty() {
        warn!(file = %file.relative, "no text extracted");
        report.files_empty += 1;
        return;
    }

    let chunks = chunk_text(&file.file_name, text, config.chunking.chunk_size);
    report.files_chunked += 1;

    if dry_run {
        report.chunks_written += chunks.len();
        return;
    }

    let output = config.knowledge.output_path();
    let mut failed = false;
    for chunk in &chunks {
        match persist_chunk(&output, chunk) {
            Ok(PersistOutcome::Written) => report.chunks_written += 1,
            Ok(PersistOutcome::Unchanged) => report.chunks_unchanged += 1,
            Err(e) => {
                error!(file = %file.relative, chunk = %chunk.id, error = %e, "failed to persist chunk");
                failed = true;
            }
        }
    }

    let entry = keep.entry(base_name(&file.file_name)).or_insert(Some(0));
    if failed {
        *entry = None;
        report.files_failed += 1;
        return;
    }
    if let Some(count) = entry {
        *count = (*count).max(chunks.len());
    }

    info!(file = %file.relative, chunks = chunks.len(), "chunked");
}

fn remove_stale(
    output: &std::path::Path,
    keep: &BTreeMap<String, Option<usize>>,
    report: &mut IngestReport,
) {
    for (base, count) in keep {
        let Some(count) = count else {
            continue;
        };
        match remove_stale_chunks(output, base, *count) {
            Ok(removed) => report.chunks_removed += removed,
            Err(e) => error!(base = %base, error = %e, "failed to remove stale chunks"),
        }
    }
}

/// Human-readable summary for the CLI.
pub fn print_report(report: &IngestReport, dry_run: bool) {
    if dry_run {
        println!("ingest (dry-run)");
    } else {
        println!("ingest");
    }
    println!("  files seen: {}", report.files_seen);
    if report.entries_unreadable > 0 {
        println!("  entries unreadable: {}", report.entries_unreadable);
    }
    println!("  files chunked: {}", report.files_chunked);
    println!("  files unsupported: {}", report.files_unsupported);
    println!("  files empty: {}", report.files_empty);
    if report.files_failed > 0 {
        println!("  files failed: {}", report.files_failed);
    }
    if dry_run {
        println!("  estimated chunks: {}", report.chunks_written);
    } else {
        println!("  chunks written: {}", report.chunks_written);
        println!("  chunks unchanged: {}", report.chunks_unchanged);
        println!("  stale chunks removed: {}", report.chunks_removed);
    }
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        let config = Config::with_root(tmp.path());
        (tmp, config)
    }

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::with_defaults(None)
    }

    #[test]
    fn test_ingest_writes_chunks() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("longo.txt"), "a".repeat(1501)).unwrap();
        fs::write(tmp.path().join("curto.md"), "  texto curto  \n").unwrap();

        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.files_seen, 2);
        assert_eq!(report.files_chunked, 2);
        assert_eq!(report.chunks_written, 5);

        let base = tmp.path().join("base");
        assert_eq!(fs::read_to_string(base.join("curto_part1.txt")).unwrap(), "texto curto");
        assert_eq!(fs::read_to_string(base.join("longo_part4.txt")).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(base.join("longo_part1.txt")).unwrap().len(),
            500
        );
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("doc.txt"), "conteúdo ".repeat(100)).unwrap();

        let first = run_ingest(&config, &registry(), false).unwrap();
        let chunk = tmp.path().join("base/doc_part1.txt");
        let before = fs::read(&chunk).unwrap();

        let second = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(second.chunks_written, 0);
        assert_eq!(second.chunks_unchanged, first.chunks_written);
        assert_eq!(fs::read(&chunk).unwrap(), before);
    }

    #[test]
    fn test_shrunk_document_drops_stale_chunks() {
        let (tmp, config) = setup();
        let doc = tmp.path().join("doc.txt");
        fs::write(&doc, "x".repeat(1200)).unwrap();
        run_ingest(&config, &registry(), false).unwrap();
        assert!(tmp.path().join("base/doc_part3.txt").exists());

        fs::write(&doc, "y".repeat(600)).unwrap();
        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.chunks_removed, 1);
        assert!(tmp.path().join("base/doc_part2.txt").exists());
        assert!(!tmp.path().join("base/doc_part3.txt").exists());
    }

    #[test]
    fn test_unsupported_and_empty_are_counted() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("foto.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
        fs::write(tmp.path().join("vazio.txt"), "   \n\t").unwrap();
        fs::write(tmp.path().join("quebrado.json"), "{").unwrap();
        fs::write(tmp.path().join("ok.txt"), "ok").unwrap();

        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.files_seen, 4);
        assert_eq!(report.files_unsupported, 1);
        assert_eq!(report.files_empty, 2);
        assert_eq!(report.files_chunked, 1);
        assert_eq!(report.chunks_total(), 1);
    }

    #[test]
    fn test_output_dir_is_not_reingested() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("a.txt"), "texto").unwrap();
        run_ingest(&config, &registry(), false).unwrap();
        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.files_seen, 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("a.txt"), "b".repeat(1000)).unwrap();

        let report = run_ingest(&config, &registry(), true).unwrap();
        assert_eq!(report.chunks_written, 2);
        assert!(!tmp.path().join("base").exists());
    }

    #[test]
    fn test_same_base_name_keeps_every_part() {
        let (tmp, config) = setup();
        fs::create_dir_all(tmp.path().join("rh")).unwrap();
        fs::create_dir_all(tmp.path().join("ti")).unwrap();
        let long = format!("{} girassol amarelo", "r".repeat(600));
        fs::write(tmp.path().join("rh/manual.txt"), &long).unwrap();
        fs::write(tmp.path().join("ti/manual.txt"), "manual de ti").unwrap();

        let first = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(first.chunks_removed, 0);
        let base = tmp.path().join("base");
        assert_eq!(fs::read_to_string(base.join("manual_part1.txt")).unwrap(), "manual de ti");
        assert!(fs::read_to_string(base.join("manual_part2.txt"))
            .unwrap()
            .contains("girassol amarelo"));

        let second = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(second.chunks_removed, 0);
        assert!(base.join("manual_part2.txt").exists());
    }

    #[test]
    fn test_persist_failure_is_isolated() {
        let (tmp, config) = setup();
        fs::write(tmp.path().join("bad.txt"), "não persiste").unwrap();
        fs::write(tmp.path().join("good.txt"), "persiste").unwrap();
        fs::create_dir_all(tmp.path().join("base/bad_part1.txt/occupied")).unwrap();

        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.files_chunked, 2);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.chunks_written, 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("base/good_part1.txt")).unwrap(),
            "persiste"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_does_not_abort() {
        let (tmp, mut config) = setup();
        fs::write(tmp.path().join("good.txt"), "conteúdo bom").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.txt"), tmp.path().join("dangling.txt"))
            .unwrap();
        config.knowledge.follow_symlinks = true;

        let report = run_ingest(&config, &registry(), false).unwrap();
        assert_eq!(report.entries_unreadable, 1);
        assert_eq!(report.files_chunked, 1);
        assert!(tmp.path().join("base/good_part1.txt").exists());
    }

    #[test]
    fn test_missing_root_fails() {
        let config = Config::with_root("/definitely/not/a/knowledge/root");
        assert!(run_ingest(&config, &registry(), true).is_err());
    }
}
