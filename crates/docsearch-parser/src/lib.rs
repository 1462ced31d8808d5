//! docsearch Parser - Text extraction for ingested documents
//!
//! Supports parsing of:
//! - PDF documents
//! - Plain text files
//!
//! Each parser implements the `DocumentParser` trait and produces a
//! `ParsedDocument`. Ingestion goes through [`extract_text_or_empty`],
//! which never fails: a document that cannot be read yields an empty
//! string and a logged warning.

use std::path::Path;
use thiserror::Error;

pub mod pdf;

pub use pdf::PdfParser;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// File is corrupted or malformed
    #[error("File is corrupted or malformed: {0}")]
    CorruptedFile(String),
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// A parsed document with extracted content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Extracted text content
    pub content: String,

    /// Number of pages, when the format has pages
    pub page_count: Option<u32>,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            content: String::new(),
            page_count: None,
        }
    }

    /// Set content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Get total word count (approximate)
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Format a document was parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    PlainText,
}

/// Ingestion only picks up files with this exact (case-sensitive) extension
pub const PDF_EXTENSION: &str = "pdf";

/// Whether a path is picked up by directory ingestion
pub fn is_pdf_path(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(PDF_EXTENSION)
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

/// Extract trimmed text, or an empty string when parsing fails.
///
/// Failures are logged and swallowed; callers skip documents whose text
/// comes back empty.
pub fn extract_text_or_empty(parser: &dyn DocumentParser, path: &Path) -> String {
    match parser.parse(path) {
        Ok(doc) => {
            tracing::debug!(
                path = %path.display(),
                pages = ?doc.page_count,
                words = doc.word_count(),
                "Extracted text"
            );
            doc.content.trim().to_string()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error extracting text");
            String::new()
        }
    }
}

// ============================================================================
// Plain Text Parser
// ============================================================================

/// Plain text parser
pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let content = std::fs::read_to_string(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(
            ParsedDocument::new(path.display().to_string(), FileType::PlainText)
                .with_content(content),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
