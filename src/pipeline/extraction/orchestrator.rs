use std::io::Cursor;
use std::path::Path;

use image::ImageOutputFormat;

use super::types::{ExtractedText, OcrEngine, PdfPageRenderer, TextExtractor};
use super::ExtractionError;
use crate::config::DEFAULT_RENDER_DPI;
use crate::pipeline::document::{Document, DocumentKind};

/// Concrete implementation of the text extractor.
/// Uses trait objects for OCR and PDF rendering, enabling dependency injection.
pub struct DocumentExtractor {
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
    render_dpi: u32,
}

impl DocumentExtractor {
    pub fn new(
        ocr_engine: Box<dyn OcrEngine + Send + Sync>,
        pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
    ) -> Self {
        Self {
            ocr_engine,
            pdf_renderer,
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }

    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    /// Classify and extract a path in one step. Unsupported extensions fail
    /// before the file is opened.
    pub fn extract_path(&self, path: &Path) -> Result<ExtractedText, ExtractionError> {
        let document = Document::from_path(path).map_err(ExtractionError::UnsupportedFormat)?;
        self.extract(&document)
    }

    /// OCR a PDF page by page, preserving page order.
    fn ocr_pdf(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let page_count = self.pdf_renderer.page_count(pdf_bytes)?;
        tracing::debug!(pages = page_count, dpi = self.render_dpi, "Rasterizing PDF");

        let mut pages = Vec::with_capacity(page_count);
        for page_idx in 0..page_count {
            let png = self
                .pdf_renderer
                .render_page(pdf_bytes, page_idx, self.render_dpi)?;
            let text = self.ocr_engine.ocr_image(&png)?;
            tracing::debug!(page = page_idx + 1, chars = text.len(), "Page OCR complete");
            pages.push(text);
        }
        Ok(pages)
    }
}

/// Decode any supported raster format and re-encode as PNG in memory.
fn normalize_image(bytes: &[u8]) -> Result<Vec<u8>, ExtractionError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to decode image: {e}")))?;

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to encode PNG: {e}")))?;
    Ok(buf.into_inner())
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError> {
        tracing::info!(
            path = %document.path().display(),
            kind = document.kind().as_str(),
            "OCR processing"
        );

        let bytes = std::fs::read(document.path())?;

        let pages = match document.kind() {
            DocumentKind::Pdf => self.ocr_pdf(&bytes)?,
            DocumentKind::Image => {
                let png = normalize_image(&bytes)?;
                vec![self.ocr_engine.ocr_image(&png)?]
            }
        };

        let text = ExtractedText::from_pages(pages)?;
        tracing::info!(
            pages = text.page_count(),
            chars = text.as_str().len(),
            "Text extraction complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::extraction::ocr::MockOcrEngine;
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;

    /// Shares one mock between the extractor and the test body.
    struct SharedOcr(Arc<MockOcrEngine>);

    impl OcrEngine for SharedOcr {
        fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError> {
            self.0.ocr_image(image_bytes)
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::GrayImage::from_pixel(32, 32, image::Luma([200u8]));
        let dynamic = image::DynamicImage::ImageLuma8(img);
        let mut buf = Cursor::new(Vec::new());
        dynamic.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    fn write_fixture(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn extractor(ocr: Arc<MockOcrEngine>, pages: usize) -> DocumentExtractor {
        DocumentExtractor::new(
            Box::new(SharedOcr(ocr)),
            Box::new(MockPdfPageRenderer::new(pages)),
        )
    }

    #[test]
    fn single_image_yields_ocr_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "report.png", &png_bytes());
        let ocr = Arc::new(MockOcrEngine::new("Lipid panel\nLDL Cholesterol 165 mg/dL\n"));

        let text = extractor(ocr.clone(), 0).extract_path(&path).unwrap();

        assert!(text.as_str().contains("LDL Cholesterol 165 mg/dL"));
        assert_eq!(text.page_count(), 1);
        assert_eq!(ocr.calls(), 1);
    }

    #[test]
    fn three_page_pdf_joins_pages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "report.pdf", b"%PDF-1.4 stub");
        let ocr = Arc::new(MockOcrEngine::with_pages(&[
            "Page 1: CBC",
            "Page 2: Lipids",
            "Page 3: Thyroid",
        ]));

        let text = extractor(ocr.clone(), 3).extract_path(&path).unwrap();

        assert_eq!(text.as_str(), "Page 1: CBC\nPage 2: Lipids\nPage 3: Thyroid");
        assert_eq!(text.page_count(), 3);
        assert_eq!(ocr.calls(), 3);
    }

    #[test]
    fn unsupported_extension_fails_before_any_backend_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "report.docx", b"whatever");
        let ocr = Arc::new(MockOcrEngine::new("never used"));

        let err = extractor(ocr.clone(), 1).extract_path(&path).unwrap_err();

        assert!(matches!(err, ExtractionError::UnsupportedFormat(ref ext) if ext == ".docx"));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn blank_ocr_output_is_empty_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "blank.png", &png_bytes());
        let ocr = Arc::new(MockOcrEngine::new("   \n  "));

        let err = extractor(ocr, 0).extract_path(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyExtraction));
    }

    #[test]
    fn zero_page_pdf_is_empty_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "empty.pdf", b"%PDF-1.4 stub");
        let ocr = Arc::new(MockOcrEngine::new("unused"));

        let err = extractor(ocr.clone(), 0).extract_path(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyExtraction));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn undecodable_image_is_image_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "broken.jpg", b"not really a jpeg");
        let ocr = Arc::new(MockOcrEngine::new("unused"));

        let err = extractor(ocr.clone(), 0).extract_path(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::ImageProcessing(_)));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ocr = Arc::new(MockOcrEngine::new("unused"));
        let err = extractor(ocr, 0)
            .extract_path(&dir.path().join("absent.png"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }

    #[test]
    fn normalize_image_outputs_png() {
        let png = normalize_image(&png_bytes()).unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    struct SharedRenderer(Arc<MockPdfPageRenderer>);

    impl PdfPageRenderer for SharedRenderer {
        fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
            self.0.page_count(pdf_bytes)
        }

        fn render_page(
            &self,
            pdf_bytes: &[u8],
            page_number: usize,
            dpi: u32,
        ) -> Result<Vec<u8>, ExtractionError> {
            self.0.render_page(pdf_bytes, page_number, dpi)
        }
    }

    #[test]
    fn pdf_pages_render_at_300_dpi_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "report.pdf", b"%PDF-1.4 stub");
        let renderer = Arc::new(MockPdfPageRenderer::new(2));

        DocumentExtractor::new(
            Box::new(MockOcrEngine::new("page")),
            Box::new(SharedRenderer(renderer.clone())),
        )
        .extract_path(&path)
        .unwrap();

        assert_eq!(renderer.rendered_dpis(), vec![300, 300]);
    }

    #[test]
    fn configured_dpi_reaches_the_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(&dir, "report.pdf", b"%PDF-1.4 stub");

        let config = crate::config::Config::default();
        let renderer = Arc::new(MockPdfPageRenderer::new(1));
        DocumentExtractor::new(
            Box::new(MockOcrEngine::new("page")),
            Box::new(SharedRenderer(renderer.clone())),
        )
        .with_render_dpi(config.render_dpi)
        .extract_path(&path)
        .unwrap();
        assert_eq!(renderer.rendered_dpis(), vec![300]);

        let renderer = Arc::new(MockPdfPageRenderer::new(1));
        DocumentExtractor::new(
            Box::new(MockOcrEngine::new("page")),
            Box::new(SharedRenderer(renderer.clone())),
        )
        .with_render_dpi(150)
        .extract_path(&path)
        .unwrap();
        assert_eq!(renderer.rendered_dpis(), vec![150]);
    }
}
