use tracing::debug;

use crate::error::BackendError;
use crate::processor::{ExtractionBackend, ExtractionInput, ExtractionMethod};

/// Pattern lopdf emits for glyphs in CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Layout-aware PDF text extraction using the embedded text layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLayoutBackend;

impl PdfLayoutBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionBackend for PdfLayoutBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::PdfLayout
    }

    fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, BackendError> {
        let _span = tracing::info_span!("backend.pdf_layout").entered();

        let pdf_bytes = input.read()?;
        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| BackendError::PdfSyntax(e.to_string()))?;

        Ok(extract_text_from_pdf(&doc))
    }
}

/// Extracts every page's text in page order, one block per page.
/// Pages whose text cannot be decoded are skipped.
pub fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                let cleaned = strip_encoding_markers(&page_text);
                if !cleaned.trim().is_empty() {
                    text.push_str(cleaned.trim_end());
                    text.push('\n');
                }
            }
            Err(e) => debug!("Skipping page {}: {}", page_num, e),
        }
    }

    text
}

fn strip_encoding_markers(text: &str) -> String {
    text.replace(IDENTITY_H_PATTERN, "")
}
