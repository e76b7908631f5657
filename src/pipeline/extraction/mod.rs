pub mod types;
pub mod ocr;
pub mod pdfium;
pub mod orchestrator;

pub use types::*;
pub use ocr::*;
pub use pdfium::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: {0}. Use PDF or common image formats.")]
    UnsupportedFormat(String),

    #[error("Extraction backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("OCR produced no text. Check if the file is valid and readable.")]
    EmptyExtraction,
}
