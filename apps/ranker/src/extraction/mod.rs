//! Document text extraction for uploaded job descriptions and resumes.
//!
//! PDF goes through lopdf one page at a time so image-only or broken pages are skipped
//! instead of failing the document. DOCX goes through docx-rs in paragraph order.
//! Both parsers are synchronous and run on the blocking pool.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

mod docx;
mod pdf;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("unsupported file type '{0}': only PDF and DOCX are accepted")]
    UnsupportedFormat(String),

    #[error("corrupt or unreadable document: {0}")]
    Corrupt(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Detects the kind from the uploaded file name. Declared content types are not trusted.
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractionError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            _ => Err(ExtractionError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// Plain text pulled out of one document. Lives only for the request that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    /// PDF pages that yielded no text (image-only or undecodable).
    pub skipped_pages: u32,
}

impl ExtractedText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Returns the text cut to at most `max_chars` characters, and whether it was cut.
    pub fn truncated(&self, max_chars: usize) -> (&str, bool) {
        match self.text.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => (&self.text[..byte_idx], true),
            None => (&self.text, false),
        }
    }
}

/// Extracts text on the blocking pool.
pub async fn extract_text(
    bytes: bytes::Bytes,
    kind: DocumentKind,
) -> Result<ExtractedText, ExtractionError> {
    tokio::task::spawn_blocking(move || extract_text_sync(&bytes, kind))
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))?
}

pub fn extract_text_sync(bytes: &[u8], kind: DocumentKind) -> Result<ExtractedText, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Corrupt("file is empty".to_string()));
    }

    let extracted = match kind {
        DocumentKind::Pdf => pdf::extract(bytes)?,
        DocumentKind::Docx => docx::extract(bytes)?,
    };

    Ok(ExtractedText {
        text: normalize_whitespace(&extracted.text),
        skipped_pages: extracted.skipped_pages,
    })
}

/// Trims trailing whitespace per line and collapses runs of blank lines.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim_end().to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{docx_with_paragraphs, pdf_with_pages};
    use super::*;

    #[test]
    fn test_kind_from_file_name_is_case_insensitive() {
        assert_eq!(DocumentKind::from_file_name("cv.PDF"), Ok(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_file_name("jane doe.docx"), Ok(DocumentKind::Docx));
    }

    #[test]
    fn test_kind_rejects_other_extensions() {
        assert!(matches!(
            DocumentKind::from_file_name("resume.doc"),
            Err(ExtractionError::UnsupportedFormat(_))
        ));
        assert!(DocumentKind::from_file_name("resume").is_err());
        assert!(DocumentKind::from_file_name("resume.pdf.exe").is_err());
    }

    #[test]
    fn test_pdf_text_is_extracted() {
        let bytes = pdf_with_pages(&[Some("Jane Doe"), Some("Senior Python Engineer")]);
        let extracted = extract_text_sync(&bytes, DocumentKind::Pdf).unwrap();
        assert!(extracted.text.contains("Jane Doe"));
        assert!(extracted.text.contains("Senior Python Engineer"));
        assert_eq!(extracted.skipped_pages, 0);
    }

    #[test]
    fn test_image_only_pages_are_skipped() {
        let bytes = pdf_with_pages(&[None, Some("AWS Certified"), None]);
        let extracted = extract_text_sync(&bytes, DocumentKind::Pdf).unwrap();
        assert!(extracted.text.contains("AWS Certified"));
        assert_eq!(extracted.skipped_pages, 2);
    }

    #[test]
    fn test_image_only_pdf_yields_empty_text_not_error() {
        let bytes = pdf_with_pages(&[None, None]);
        let extracted = extract_text_sync(&bytes, DocumentKind::Pdf).unwrap();
        assert!(extracted.is_empty());
        assert_eq!(extracted.skipped_pages, 2);
    }

    #[test]
    fn test_garbage_pdf_is_corrupt() {
        let result = extract_text_sync(b"definitely not a pdf", DocumentKind::Pdf);
        assert!(matches!(result, Err(ExtractionError::Corrupt(_))));
    }

    #[test]
    fn test_empty_file_is_corrupt() {
        let result = extract_text_sync(&[], DocumentKind::Docx);
        assert!(matches!(result, Err(ExtractionError::Corrupt(_))));
    }

    #[test]
    fn test_docx_paragraphs_in_document_order() {
        let bytes = docx_with_paragraphs(&["John Smith", "Python developer, 6 years", "AWS"]);
        let extracted = extract_text_sync(&bytes, DocumentKind::Docx).unwrap();
        assert_eq!(extracted.text, "John Smith\nPython developer, 6 years\nAWS");
    }

    #[test]
    fn test_garbage_docx_is_corrupt() {
        let result = extract_text_sync(b"PK\x03\x04 truncated", DocumentKind::Docx);
        assert!(matches!(result, Err(ExtractionError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_async_extraction_runs_on_blocking_pool() {
        let bytes = bytes::Bytes::from(docx_with_paragraphs(&["Kubernetes"]));
        let extracted = extract_text(bytes, DocumentKind::Docx).await.unwrap();
        assert_eq!(extracted.text, "Kubernetes");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        let text = "\n\nJane  \n\n\n\nEngineer\t\n";
        assert_eq!(normalize_whitespace(text), "Jane\n\nEngineer");
    }

    #[test]
    fn test_truncated_respects_char_boundaries() {
        let extracted = ExtractedText {
            text: "héllo wörld".to_string(),
            skipped_pages: 0,
        };
        assert_eq!(extracted.truncated(5), ("héllo", true));
        assert_eq!(extracted.truncated(100), ("héllo wörld", false));
    }
}
