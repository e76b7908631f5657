//! PDF page rendering via Google PDFium.
//!
//! Rasterizes individual PDF pages to PNG images for OCR.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation binds a
//! fresh `Pdfium` instance because the upstream type is `!Send`. The OS caches
//! `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Mutex;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG images using Google PDFium.
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// `library_path` points at the PDFium shared library itself. When
    /// absent, the directory of the running executable and then the system
    /// library paths are searched.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Bind the library once and drop it. Used by the setup check.
    pub fn probe(&self) -> Result<(), ExtractionError> {
        self.load().map(|_| ())
    }

    fn load(&self) -> Result<Pdfium, ExtractionError> {
        // 1. Explicit path
        if let Some(path) = &self.library_path {
            debug!(path = %path.display(), "Loading PDFium from configured path");
            let bindings = Pdfium::bind_to_library(path).map_err(|e| {
                ExtractionError::BackendUnavailable(format!(
                    "Failed to load PDFium from {}: {e}",
                    path.display()
                ))
            })?;
            return Ok(Pdfium::new(bindings));
        }

        // 2. Alongside the executable
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        {
            for dir in [exe_dir.clone(), exe_dir.join("pdfium").join("lib")] {
                let lib_path =
                    Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
                if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                    debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
                    return Ok(Pdfium::new(bindings));
                }
            }
        }

        // 3. System library
        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            ExtractionError::BackendUnavailable(format!(
                "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
            ))
        })?;
        Ok(Pdfium::new(bindings))
    }
}

fn map_load_error(e: PdfiumError) -> ExtractionError {
    ExtractionError::PdfRendering {
        page: 0,
        reason: format!("Failed to load PDF: {e}"),
    }
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = self.load()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = self.load()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let pages = document.pages();

        let page_index = u16::try_from(page_number).map_err(|_| ExtractionError::PdfRendering {
            page: page_number,
            reason: format!("Page index {page_number} exceeds u16 maximum"),
        })?;

        let page = pages
            .get(page_index)
            .map_err(|_| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (document has {} pages)",
                    pages.len()
                ),
            })?;

        let (target_w, target_h) =
            compute_render_dimensions(page.width().value, page.height().value, dpi);
        if target_w == MAX_DIMENSION_PX || target_h == MAX_DIMENSION_PX {
            warn!(
                page = page_number,
                width = target_w,
                height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        let png_bytes = cursor.into_inner();

        debug!(
            page = page_number,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rendered PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock PDF page renderer returning a minimal PNG for each valid page.
/// Records the DPI of every render request.
pub struct MockPdfPageRenderer {
    page_count: usize,
    rendered_dpis: Mutex<Vec<u32>>,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            rendered_dpis: Mutex::new(Vec::new()),
        }
    }

    pub fn rendered_dpis(&self) -> Vec<u32> {
        self.rendered_dpis
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        Ok(self.page_count)
    }

    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        self.rendered_dpis
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(dpi);
        if page_number >= self.page_count {
            return Err(ExtractionError::PdfRendering {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        Ok(minimal_png())
    }
}

/// Minimal valid 1x1 white pixel PNG for mock testing.
fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // 8-bit RGB
        0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, // compressed
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, // IDAT CRC
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}
