//! PDF document parser using pdf-extract
//!
//! Extracts the text of every page and concatenates it in page order.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::{DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl PdfParser {
    /// Create a new PDF parser
    pub fn new() -> Self {
        Self
    }

    /// Extract text from a PDF file
    fn extract_text(&self, path: &Path) -> Result<(String, Option<u32>)> {
        let bytes = std::fs::read(path).map_err(|e| ParserError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        // pdf-extract panics on some malformed inputs
        let text = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(&bytes)
        }))
        .map_err(|_| ParserError::CorruptedFile(path.display().to_string()))?
        .map_err(|e| ParserError::PdfError(e.to_string()))?;

        let page_count = estimate_page_count(&text);
        Ok((text, page_count))
    }
}

/// Rough page count from the form feeds pdf-extract emits between pages
fn estimate_page_count(text: &str) -> Option<u32> {
    let breaks = text.matches('\x0C').count() as u32;
    if breaks > 0 {
        Some(breaks + 1)
    } else {
        None
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let (text, page_count) = self.extract_text(path)?;

        let mut doc =
            ParsedDocument::new(path.display().to_string(), FileType::Pdf).with_content(text);
        doc.page_count = page_count;

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract_text_or_empty;
    use std::io::Write;

    /// Single-page PDF drawing `text` in Helvetica, with a valid xref table
    fn one_page_pdf(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref_start = pdf.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            xref.push_str(&format!("{offset:010} 00000 n \n"));
        }
        xref.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        ));
        pdf.extend_from_slice(xref.as_bytes());
        pdf
    }

    #[test]
    fn test_extracts_page_text() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&one_page_pdf("Tenants have rights")).unwrap();
        file.flush().unwrap();

        let doc = PdfParser::new().parse(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::Pdf);
        assert!(doc.content.contains("Tenants have rights"));

        assert_eq!(
            extract_text_or_empty(&PdfParser::new(), file.path()),
            "Tenants have rights"
        );
    }

    #[test]
    fn test_page_count_estimate() {
        assert_eq!(estimate_page_count("single page"), None);
        assert_eq!(estimate_page_count("one\x0Ctwo\x0Cthree"), Some(3));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = PdfParser::new().parse(Path::new("/nonexistent/guide.pdf"));
        assert!(matches!(result, Err(ParserError::IoError { .. })));
    }

    #[test]
    fn test_garbage_pdf_yields_empty_text() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"this is definitely not a pdf").unwrap();

        assert!(PdfParser::new().parse(file.path()).is_err());
        assert_eq!(extract_text_or_empty(&PdfParser::new(), file.path()), "");
    }
}
