use lopdf::Document;
use tracing::debug;

use super::{ExtractedText, ExtractionError};

/// Extracts text page by page. Pages that fail to decode or carry no text are
/// counted and skipped; only an unloadable document is an error.
pub(super) fn extract(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    let mut text = String::new();
    let mut skipped_pages = 0;

    for page_no in document.get_pages().keys() {
        match document.extract_text(&[*page_no]) {
            Ok(page_text) if !page_text.trim().is_empty() => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Ok(_) => {
                debug!("PDF page {page_no} has no extractable text, skipping");
                skipped_pages += 1;
            }
            Err(e) => {
                debug!("PDF page {page_no} could not be decoded, skipping: {e}");
                skipped_pages += 1;
            }
        }
    }

    Ok(ExtractedText {
        text,
        skipped_pages,
    })
}
