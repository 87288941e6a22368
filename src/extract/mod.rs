//! Document text extraction
//!
//! Dispatches on file extension to the right extraction strategy and returns
//! one concatenated document string:
//!
//! - `.pdf`  - per-page text via pdf-extract, pages joined with a blank line
//! - `.docx` - document body text via docx-rs
//! - `.txt`  - strict UTF-8 decode of the raw bytes
//!
//! The PDF and DOCX extractors want a file path, so uploaded bytes are first
//! spooled to a named temp file. The temp file is removed on every exit path
//! (success or failure) by its RAII guard.

use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Extensions the loader accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

/// Extracts plain text from uploaded documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    /// Directory for spool files. Defaults to the system temp dir; tests
    /// inject their own so they can assert cleanup.
    spool_dir: Option<PathBuf>,
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spool uploads into the given directory instead of the system temp dir.
    pub fn with_spool_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: Some(dir.into()),
        }
    }

    /// Extract the full text of an uploaded document.
    ///
    /// The filename is only inspected for its extension; content never
    /// touches disk except for the scoped spool file the extractors need.
    pub fn load(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let ext = extension_of(filename);
        tracing::debug!(
            filename,
            size = bytes.len(),
            ext = ext.as_deref().unwrap_or("<none>"),
            "extracting document text"
        );

        match ext.as_deref() {
            Some("txt") => decode_text(bytes),
            Some("pdf") => {
                let spool = self.spool(bytes, ".pdf")?;
                extract_pdf(spool.path())
            }
            Some("docx") => {
                let spool = self.spool(bytes, ".docx")?;
                extract_docx(spool.path())
            }
            other => Err(Error::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    /// Write uploaded bytes to a scoped temp file for path-based extractors.
    fn spool(&self, bytes: &[u8], suffix: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lexsum-upload-").suffix(suffix);
        let mut file = match &self.spool_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }
}

/// Lowercased extension of a filename, if it has one.
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Decode raw bytes as UTF-8 text.
fn decode_text(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| Error::Decode(e.to_string()))
}

/// Join per-page texts with a blank-line separator, preserving page order.
fn join_pages(pages: Vec<String>) -> String {
    pages.join("\n\n")
}

/// Extract per-page text from a PDF on disk.
///
/// Wrapped in `catch_unwind` because pdf-extract can panic on malformed
/// fonts and glyph tables; a bad upload must not take the process down.
fn extract_pdf(path: &Path) -> Result<String> {
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));
    match result {
        Ok(Ok(pages)) => Ok(join_pages(pages)),
        Ok(Err(e)) => Err(Error::Extraction(format!("pdf: {}", e))),
        Err(_) => Err(Error::Extraction(
            "pdf extraction panicked, the file may contain malformed fonts".to_string(),
        )),
    }
}

/// Extract body text from a DOCX on disk.
fn extract_docx(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| Error::Extraction(format!("docx: {}", e)))?;

    let mut text = String::new();
    for child in &docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(para) => {
                text.push_str(&paragraph_text(para));
                text.push('\n');
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(tr) = row;
                    let cells: Vec<String> = tr
                        .cells
                        .iter()
                        .map(|cell| {
                            let docx_rs::TableRowChild::TableCell(tc) = cell;
                            tc.children
                                .iter()
                                .filter_map(|content| match content {
                                    docx_rs::TableCellContent::Paragraph(p) => {
                                        Some(paragraph_text(p))
                                    }
                                    _ => None,
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect();
                    text.push_str(&cells.join("\t"));
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(text)
}

/// Concatenated run text of one paragraph, hyperlink runs included.
fn paragraph_text(para: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    for child in &para.children {
        match child {
            docx_rs::ParagraphChild::Run(run) => push_run_text(run, &mut out),
            docx_rs::ParagraphChild::Hyperlink(link) => {
                for nested in &link.children {
                    if let docx_rs::ParagraphChild::Run(run) = nested {
                        push_run_text(run, &mut out);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn push_run_text(run: &docx_rs::Run, out: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => out.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => out.push(' '),
            _ => {}
        }
    }
}
