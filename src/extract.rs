//! Text extraction for uploaded documents.
//!
//! Uploads arrive as raw bytes plus a file name. The extension selects a
//! [`DocumentKind`]; this module returns the plain UTF-8 text that the
//! chunker consumes. The raw bytes themselves are stored untouched.

use kb_harness_core::{KbError, Result};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_PDF: &str = "application/pdf";

/// Document formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Select a kind from the file extension, case-insensitively.
    ///
    /// ```rust
    /// use kb_harness::extract::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::from_file_name("Notes.MD").unwrap(), DocumentKind::Markdown);
    /// assert!(DocumentKind::from_file_name("image.png").is_err());
    /// ```
    pub fn from_file_name(name: &str) -> Result<Self> {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(DocumentKind::Text),
            "md" | "markdown" => Ok(DocumentKind::Markdown),
            "pdf" => Ok(DocumentKind::Pdf),
            _ => Err(KbError::Validation(format!(
                "unsupported file type: {} (expected .txt, .md, or .pdf)",
                name
            ))),
        }
    }

    /// MIME type stored when the upload does not declare one.
    pub fn default_mime(self) -> &'static str {
        match self {
            DocumentKind::Text => MIME_TEXT,
            DocumentKind::Markdown => MIME_MARKDOWN,
            DocumentKind::Pdf => MIME_PDF,
        }
    }
}

/// Extract plain text from `bytes`.
///
/// Text and Markdown must be valid UTF-8. PDF text is collected page by
/// page; blank pages are skipped and each kept page ends with `\n`.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String> {
    match kind {
        DocumentKind::Text | DocumentKind::Markdown => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| KbError::DocumentFormat(format!("invalid UTF-8: {}", e))),
        DocumentKind::Pdf => extract_pdf(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed inputs instead of returning an error.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| KbError::DocumentFormat("PDF parser aborted".to_string()))?
        .map_err(|e| KbError::DocumentFormat(format!("PDF extraction failed: {}", e)))?;
    Ok(join_pages(pages))
}

fn join_pages(pages: Vec<String>) -> String {
    let mut out = String::new();
    for page in pages {
        if page.trim().is_empty() {
            continue;
        }
        out.push_str(&page);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            DocumentKind::from_file_name("a.txt").unwrap(),
            DocumentKind::Text
        );
        assert_eq!(
            DocumentKind::from_file_name("README.markdown").unwrap(),
            DocumentKind::Markdown
        );
        assert_eq!(
            DocumentKind::from_file_name("Report.PDF").unwrap(),
            DocumentKind::Pdf
        );
        assert!(matches!(
            DocumentKind::from_file_name("noext"),
            Err(KbError::Validation(_))
        ));
        assert!(matches!(
            DocumentKind::from_file_name("archive.zip"),
            Err(KbError::Validation(_))
        ));
    }

    #[test]
    fn test_text_is_passed_through() {
        let text = extract_text("héllo\nworld".as_bytes(), DocumentKind::Text).unwrap();
        assert_eq!(text, "héllo\nworld");
        assert_eq!(extract_text(b"", DocumentKind::Markdown).unwrap(), "");
    }

    #[test]
    fn test_invalid_utf8_is_format_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], DocumentKind::Text).unwrap_err();
        assert!(matches!(err, KbError::DocumentFormat(_)));
    }

    #[test]
    fn test_malformed_pdf_is_format_error() {
        let err = extract_text(b"not a valid pdf", DocumentKind::Pdf).unwrap_err();
        assert!(matches!(err, KbError::DocumentFormat(_)));
    }

    #[test]
    fn test_join_pages_skips_blank_pages() {
        let joined = join_pages(vec![
            "first page".to_string(),
            "  \n\t".to_string(),
            String::new(),
            "third page".to_string(),
        ]);
        assert_eq!(joined, "first page\nthird page\n");
    }

    #[test]
    fn test_default_mime() {
        assert_eq!(DocumentKind::Pdf.default_mime(), "application/pdf");
        assert_eq!(DocumentKind::Text.default_mime(), "text/plain");
    }
}
