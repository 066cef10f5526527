//! Multi-format text extraction.
//!
//! Each format is a [`TextExtractor`] registered in an [`ExtractorRegistry`]
//! under its file extensions. The registry is the only entry point the rest
//! of the crate uses: [`ExtractorRegistry::extract`] never fails, it logs the
//! error and returns an empty string, so one unreadable file never stops a
//! batch.
//!
//! | Extensions | Extractor | Output |
//! |------------|-----------|--------|
//! | `txt`, `md` | [`PlainTextExtractor`] | file contents |
//! | `json` | [`JsonExtractor`] | pretty-printed JSON, 2-space indent |
//! | `csv` | [`CsvExtractor`] | one line per record, fields space-separated |
//! | `xlsx`, `xls`, `xlsm`, `ods` | [`SpreadsheetExtractor`] | one line per row after the header |
//! | `docx` | [`DocxExtractor`] | one line per non-blank paragraph |
//! | `pdf` | [`PdfExtractor`] | page texts, OCR for pages without text |

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use calamine::Reader;
use tracing::{error, warn};

use crate::config::Config;
use crate::error::ExtractError;
use crate::ocr::{CommandOcr, PageOcr};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Converts one file format to plain text.
pub trait TextExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Lowercase extensions, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Extension → extractor mapping.
#[derive(Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in format. `ocr` is used for PDF pages
    /// without embedded text.
    pub fn with_defaults(ocr: Option<Arc<dyn PageOcr>>) -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextExtractor);
        registry.register(JsonExtractor);
        registry.register(CsvExtractor);
        registry.register(SpreadsheetExtractor);
        registry.register(DocxExtractor);
        registry.register(PdfExtractor::new(ocr));
        registry
    }

    pub fn from_config(config: &Config) -> Self {
        let ocr: Option<Arc<dyn PageOcr>> = if config.ocr.enabled {
            Some(Arc::new(CommandOcr::from_config(&config.ocr)))
        } else {
            None
        };
        Self::with_defaults(ocr)
    }

    /// Register `extractor` for all of its extensions, replacing any
    /// extractor previously registered for the same extension.
    pub fn register<E: TextExtractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn TextExtractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert((*ext).to_string(), Arc::clone(&extractor));
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn TextExtractor>> {
        self.by_extension.get(&extension.to_lowercase()).cloned()
    }

    pub fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.by_extension.contains_key(&ext))
    }

    /// Sorted list of registered extensions.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_extension.keys().cloned().collect();
        exts.sort();
        exts
    }

    pub fn try_extract(&self, path: &Path) -> Result<String, ExtractError> {
        let ext = extension_of(path).unwrap_or_default();
        let extractor = self
            .by_extension
            .get(&ext)
            .ok_or_else(|| ExtractError::UnsupportedExtension(ext.clone()))?;
        extractor.extract(path)
    }

    /// Best-effort extraction: any failure is logged and yields `""`.
    pub fn extract(&self, path: &Path) -> String {
        match self.try_extract(path) {
            Ok(text) => text,
            Err(ExtractError::UnsupportedExtension(ext)) => {
                warn!(path = %path.display(), extension = %ext, "unsupported file format");
                String::new()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "text extraction failed");
                String::new()
            }
        }
    }
}

/// Lowercase extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Plain UTF-8 text and Markdown.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "md"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// JSON documents, re-serialized with 2-space indentation.
pub struct JsonExtractor;

impl TextExtractor for JsonExtractor {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

/// CSV files. The header row is skipped; each record becomes one line.
pub struct CsvExtractor;

impl TextExtractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let mut lines = Vec::new();
        for record in reader.records() {
            let record = record?;
            lines.push(record.iter().collect::<Vec<_>>().join(" "));
        }
        Ok(lines.join("\n"))
    }
}

/// Excel and OpenDocument spreadsheets. In every sheet the first row is
/// treated as the header and skipped; each remaining row becomes one line.
pub struct SpreadsheetExtractor;

impl TextExtractor for SpreadsheetExtractor {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xlsx", "xls", "xlsm", "ods"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let mut workbook = calamine::open_workbook_auto(path)
            .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

        let mut lines = Vec::new();
        for sheet_name in workbook.sheet_names().to_vec() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

            for row in range.rows().skip(1) {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                if cells.iter().all(|c| c.is_empty()) {
                    continue;
                }
                lines.push(cells.join(" "));
            }
        }
        Ok(lines.join("\n"))
    }
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.clone(),
        calamine::Data::Float(f) => f.to_string(),
        calamine::Data::Int(i) => i.to_string(),
        calamine::Data::Bool(b) => b.to_string(),
        calamine::Data::DateTime(dt) => dt.to_string(),
        calamine::Data::DateTimeIso(s) | calamine::Data::DurationIso(s) => s.clone(),
        calamine::Data::Error(e) => e.to_string(),
    }
}

/// Word documents: the `<w:t>` runs of `word/document.xml`, one line per
/// non-blank paragraph.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["docx"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        extract_docx(&bytes)
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Ooxml("word/document.xml not found".to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let paragraphs = extract_paragraphs(&doc_xml)?;
    Ok(paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

/// PDF documents, page by page.
///
/// Pages come from `lopdf`. A page that yields no text is sent to the OCR
/// engine when one is configured. Documents `lopdf` cannot load are handed
/// to `pdf-extract` as a whole.
pub struct PdfExtractor {
    ocr: Option<Arc<dyn PageOcr>>,
}

impl PdfExtractor {
    pub fn new(ocr: Option<Arc<dyn PageOcr>>) -> Self {
        Self { ocr }
    }

    fn page_text(&self, path: &Path, doc: &lopdf::Document, page_number: u32) -> String {
        let text = doc.extract_text(&[page_number]).unwrap_or_default();
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }

        match &self.ocr {
            Some(ocr) => {
                tracing::info!(
                    path = %path.display(),
                    page = page_number,
                    "page has no embedded text, running OCR"
                );
                match ocr.recognize(path, page_number) {
                    Ok(text) => text.trim().to_string(),
                    Err(e) => {
                        warn!(path = %path.display(), page = page_number, error = %e, "OCR failed");
                        String::new()
                    }
                }
            }
            None => {
                tracing::debug!(
                    path = %path.display(),
                    page = page_number,
                    "page has no embedded text and OCR is disabled"
                );
                String::new()
            }
        }
    }
}

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let doc = match lopdf::Document::load_mem(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "lopdf could not load PDF, trying pdf-extract");
                return extract_pdf_whole(&bytes);
            }
        };

        let mut out = String::new();
        for page_number in doc.get_pages().keys() {
            let text = self.page_text(path, &doc, *page_number);
            out.push('\n');
            out.push_str(&text);
            out.push('\n');
        }
        Ok(out)
    }
}

fn extract_pdf_whole(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed font tables.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("pdf-extract panicked".to_string())),
    }
}
