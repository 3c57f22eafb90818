//! Plain-text extraction for the document formats the assistant reads
//!
//! Text files are read as-is. PDF text comes from `pdf-extract`; DOCX files
//! are unzipped and the run text of `word/document.xml` is collected, one line
//! per paragraph. Parsing runs on the blocking pool.

use crate::error::{GemmaChatError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;

/// Document formats with text extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.txt`, `.md`, `.markdown`
    Text,
    /// `.pdf`
    Pdf,
    /// `.docx`
    Docx,
}

impl DocumentFormat {
    /// Format implied by the file extension, ignoring case
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "txt" | "md" | "markdown" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Read `path` and return its text
///
/// # Errors
///
/// Returns `GemmaChatError::Document` for unsupported extensions or content
/// that cannot be parsed, and `GemmaChatError::Io` if the file cannot be read
pub async fn extract_text(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path).ok_or_else(|| {
        GemmaChatError::Document(format!("Unsupported file format: {}", path.display()))
    })?;
    let bytes = tokio::fs::read(path).await.map_err(GemmaChatError::Io)?;
    tracing::debug!("Extracting {:?} text from {} ({} bytes)", format, path.display(), bytes.len());

    match format {
        DocumentFormat::Text => Ok(String::from_utf8(bytes).map_err(|_| {
            GemmaChatError::Document(format!("{} is not valid UTF-8", path.display()))
        })?),
        DocumentFormat::Pdf => run_blocking(move || extract_pdf(&bytes)).await,
        DocumentFormat::Docx => run_blocking(move || extract_docx(&bytes)).await,
    }
}

async fn run_blocking<F>(parse: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    tokio::task::spawn_blocking(parse).await.map_err(|e| {
        GemmaChatError::Document(format!("Document parser stopped: {}", e))
    })?
}

/// Text of every page of a PDF
///
/// # Errors
///
/// Returns `GemmaChatError::Document` if the PDF cannot be parsed
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed inputs instead of returning an error
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(GemmaChatError::Document(format!("Failed to read PDF: {}", e)).into()),
        Err(_) => Err(GemmaChatError::Document("Failed to read PDF: parser panicked".to_string()).into()),
    }
}

/// Paragraph text of a DOCX file
///
/// # Errors
///
/// Returns `GemmaChatError::Document` if the archive or its XML is invalid
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| GemmaChatError::Document(format!("Failed to open DOCX: {}", e)))?;
    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| GemmaChatError::Document(format!("DOCX has no document body: {}", e)))?
        .read_to_end(&mut xml)
        .map_err(GemmaChatError::Io)?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut text = String::new();
    let mut in_run_text = false;
    loop {
        let event = reader
            .read_event()
            .map_err(|e| GemmaChatError::Document(format!("Invalid DOCX XML: {}", e)))?;
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run_text => {
                let run = e
                    .unescape()
                    .map_err(|e| GemmaChatError::Document(format!("Invalid DOCX XML: {}", e)))?;
                text.push_str(&run);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}
