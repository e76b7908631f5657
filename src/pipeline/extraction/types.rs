use serde::Serialize;

use super::ExtractionError;
use crate::pipeline::document::Document;

/// Plain text recovered from a document, pages joined by newlines.
///
/// Only constructed through [`ExtractedText::from_pages`], which refuses
/// whitespace-only output, so a value of this type always carries text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExtractedText {
    text: String,
    page_count: usize,
}

impl ExtractedText {
    /// Join per-page OCR output in page order.
    pub fn from_pages(pages: Vec<String>) -> Result<Self, ExtractionError> {
        let page_count = pages.len();
        let text = pages.join("\n");
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyExtraction);
        }
        Ok(Self { text, page_count })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    /// Recognize text in one encoded image (PNG bytes).
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Rasterizes PDF pages to in-memory PNG images.
pub trait PdfPageRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// Render a zero-based page at the given DPI.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// Main extraction trait
pub trait TextExtractor {
    fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_join_with_newline_in_order() {
        let text = ExtractedText::from_pages(vec![
            "page one".into(),
            "page two".into(),
            "page three".into(),
        ])
        .unwrap();
        assert_eq!(text.as_str(), "page one\npage two\npage three");
        assert_eq!(text.page_count(), 3);
    }

    #[test]
    fn duplicate_pages_are_kept() {
        let text = ExtractedText::from_pages(vec!["same".into(), "same".into()]).unwrap();
        assert_eq!(text.as_str(), "same\nsame");
    }

    #[test]
    fn whitespace_only_is_rejected() {
        let err = ExtractedText::from_pages(vec!["  ".into(), "\n\t".into()]).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyExtraction));
    }

    #[test]
    fn no_pages_is_rejected() {
        let err = ExtractedText::from_pages(vec![]).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyExtraction));
    }

    #[test]
    fn blank_page_among_text_is_accepted() {
        let text = ExtractedText::from_pages(vec!["".into(), "Glucose 98".into()]).unwrap();
        assert_eq!(text.as_str(), "\nGlucose 98");
    }
}
