//! OCR fallback for PDF pages that carry no embedded text.
//!
//! OCR itself is delegated to external tools: [`CommandOcr`] renders one page
//! with `pdftoppm` and reads the image with `tesseract`. Any other engine can
//! be plugged in through [`PageOcr`].

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrConfig;
use crate::error::ExtractError;

/// Recognizes the text of a single PDF page.
pub trait PageOcr: Send + Sync {
    /// `page_number` is 1-based.
    fn recognize(&self, pdf: &Path, page_number: u32) -> Result<String, ExtractError>;
}

/// OCR through the `pdftoppm` and `tesseract` command-line tools.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    pdftoppm: PathBuf,
    tesseract: PathBuf,
    language: String,
    dpi: u32,
}

impl CommandOcr {
    pub fn new(pdftoppm: impl Into<PathBuf>, tesseract: impl Into<PathBuf>, language: &str) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
            tesseract: tesseract.into(),
            language: language.to_string(),
            dpi: 300,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(&config.pdftoppm, &config.tesseract, &config.language)
    }
}

impl PageOcr for CommandOcr {
    fn recognize(&self, pdf: &Path, page_number: u32) -> Result<String, ExtractError> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");
        let page = page_number.to_string();

        let render = Command::new(&self.pdftoppm)
            .args(["-f", &page, "-l", &page, "-r", &self.dpi.to_string()])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| ExtractError::Ocr(format!("cannot run {}: {}", self.pdftoppm.display(), e)))?;
        if !render.status.success() {
            return Err(ExtractError::Ocr(format!(
                "pdftoppm exited with {}: {}",
                render.status,
                String::from_utf8_lossy(&render.stderr).trim()
            )));
        }

        let image = prefix.with_extension("png");
        let read = Command::new(&self.tesseract)
            .arg(&image)
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| ExtractError::Ocr(format!("cannot run {}: {}", self.tesseract.display(), e)))?;
        if !read.status.success() {
            return Err(ExtractError::Ocr(format!(
                "tesseract exited with {}: {}",
                read.status,
                String::from_utf8_lossy(&read.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&read.stdout).into_owned())
    }
}
