//! Plain-text extraction for agreements (PDF, DOCX, plain text).
//!
//! Two views of a document are offered:
//!
//! - [`extract_file`] returns the whole text, used when a single agreement
//!   is processed.
//! - [`read_corpus_document`] returns an ordered list of paragraphs, used
//!   by clause discovery. DOCX paragraphs are `w:p` elements; PDF and text
//!   files are split into non-empty lines.
//!
//! Extraction never panics on malformed input; errors are returned and the
//! caller decides whether to skip the file.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("{0} is not valid UTF-8 text")]
    NotUtf8(String),
}

/// Document kind, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    /// Kind for `path`. Unknown extensions are read as text.
    pub fn of(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("docx") => DocumentKind::Docx,
            _ => DocumentKind::Text,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether discovery reads this file as part of a corpus.
pub fn is_corpus_file(path: &Path) -> bool {
    matches!(
        extension(path).as_deref(),
        Some("docx") | Some("pdf") | Some("txt") | Some("md")
    )
}

/// Whole text of one document.
pub fn extract_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = read_bytes(path)?;
    match DocumentKind::of(path) {
        DocumentKind::Pdf => extract_pdf(&bytes),
        DocumentKind::Docx => Ok(docx_paragraphs(&bytes)?.join("\n")),
        DocumentKind::Text => {
            String::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8(path.display().to_string()))
        }
    }
}

/// Paragraphs of one corpus document, in order, empty ones dropped.
pub fn read_corpus_document(path: &Path) -> Result<Vec<String>, ExtractError> {
    let paragraphs = match DocumentKind::of(path) {
        DocumentKind::Docx => docx_paragraphs(&read_bytes(path)?)?,
        _ => extract_file(path)?.lines().map(str::to_string).collect(),
    };
    Ok(paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ExtractError> {
    std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Paragraph texts of a DOCX archive.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|_| ExtractError::Docx(format!("{} not found", DOCUMENT_XML)))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(format!(
            "{} exceeds size limit ({} bytes)",
            DOCUMENT_XML, MAX_XML_ENTRY_BYTES
        )));
    }
    paragraphs_from_xml(&doc_xml)
}

/// Collect `w:t` text runs grouped by enclosing `w:p`.
///
/// Tabs (`w:tab`) and breaks (`w:br`) inside a paragraph become a space.
fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    current.push(' ');
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}
