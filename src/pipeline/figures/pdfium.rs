//! Figure page rasterisation through the PDFium shared library.
//!
//! `Pdfium` is `!Send`, so the renderer keeps no handle: each batch binds
//! the library, opens the document once and renders every requested page.

use std::collections::HashSet;
use std::io::Cursor;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::debug;

use super::types::PdfPageRenderer;
use super::FigureError;

/// Explicit path to the PDFium shared library.
pub const PDFIUM_PATH_ENV: &str = "PDFIUM_DYNAMIC_LIB_PATH";

/// Longest edge of a rendered page image.
const MAX_EDGE_PX: u32 = 4096;

const POINTS_PER_INCH: f32 = 72.0;

/// Renders figure pages with PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Fails when no PDFium library can be bound.
    pub fn new() -> Result<Self, FigureError> {
        bind_pdfium()?;
        Ok(Self)
    }
}

/// An explicit `PDFIUM_DYNAMIC_LIB_PATH` must bind. Otherwise try next to
/// the executable, then its `../lib`, then the system search path.
fn bind_pdfium() -> Result<Pdfium, FigureError> {
    if let Ok(path) = std::env::var(PDFIUM_PATH_ENV) {
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| FigureError::RendererUnavailable(format!("{path}: {e}")));
    }

    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));
    if let Some(dir) = exe_dir {
        for candidate in [dir.clone(), dir.join("..").join("lib")] {
            let library =
                Pdfium::pdfium_platform_library_name_at_path(candidate.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&library) {
                debug!(dir = %candidate.display(), "PDFium bound");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| {
            FigureError::RendererUnavailable(format!(
                "no PDFium library found (set {PDFIUM_PATH_ENV}): {e}"
            ))
        })
}

/// Target bitmap size for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelSize {
    width: u32,
    height: u32,
    /// Scaled down to fit `MAX_EDGE_PX`.
    capped: bool,
}

impl PixelSize {
    fn for_page(width_pt: f32, height_pt: f32, dpi: u32) -> Self {
        let scale = dpi as f32 / POINTS_PER_INCH;
        let width = (width_pt * scale).max(1.0);
        let height = (height_pt * scale).max(1.0);
        let shrink = (MAX_EDGE_PX as f32 / width.max(height)).min(1.0);
        Self {
            width: ((width * shrink) as u32).clamp(1, MAX_EDGE_PX),
            height: ((height * shrink) as u32).clamp(1, MAX_EDGE_PX),
            capped: shrink < 1.0,
        }
    }
}

/// Outer error: the library or the document is unusable. Inner: per page.
fn render_batch(
    pdf_bytes: &[u8],
    pages: &[usize],
    dpi: u32,
) -> Result<Vec<Result<Vec<u8>, FigureError>>, FigureError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| FigureError::DocumentOpen(e.to_string()))?;
    Ok(pages
        .iter()
        .map(|&page| render_one(&document, page, dpi))
        .collect())
}

fn render_one(document: &PdfDocument, page: usize, dpi: u32) -> Result<Vec<u8>, FigureError> {
    let fail = |reason: String| FigureError::PageRender { page, reason };
    let pages = document.pages();
    let pdf_page = u16::try_from(page)
        .ok()
        .and_then(|index| pages.get(index).ok())
        .ok_or_else(|| fail(format!("no such page (document has {})", pages.len())))?;

    let size = PixelSize::for_page(pdf_page.width().value, pdf_page.height().value, dpi);
    if size.capped {
        debug!(
            page = page + 1,
            width = size.width,
            height = size.height,
            "Page bitmap capped at {MAX_EDGE_PX}px"
        );
    }

    let settings = PdfRenderConfig::new()
        .set_target_width(size.width as i32)
        .set_maximum_height(size.height as i32);
    let bitmap = pdf_page
        .render_with_config(&settings)
        .map_err(|e| fail(e.to_string()))?;

    let mut png = Cursor::new(Vec::new());
    bitmap
        .as_image()
        .write_to(&mut png, ImageOutputFormat::Png)
        .map_err(|e| FigureError::ImageEncoding(e.to_string()))?;
    Ok(png.into_inner())
}

/// Spread a batch-level failure over every requested page.
fn fail_all(pages: &[usize], err: &FigureError) -> Vec<Result<Vec<u8>, FigureError>> {
    let reason = err.to_string();
    pages
        .iter()
        .map(|&page| {
            Err(FigureError::PageRender {
                page,
                reason: reason.clone(),
            })
        })
        .collect()
}

impl PdfPageRenderer for PdfiumRenderer {
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, FigureError> {
        render_batch(pdf_bytes, &[page_index], dpi)?
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                Err(FigureError::PageRender {
                    page: page_index,
                    reason: "nothing rendered".into(),
                })
            })
    }

    fn render_pages(
        &self,
        pdf_bytes: &[u8],
        page_indices: &[usize],
        dpi: u32,
    ) -> Vec<Result<Vec<u8>, FigureError>> {
        render_batch(pdf_bytes, page_indices, dpi)
            .unwrap_or_else(|e| fail_all(page_indices, &e))
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Renders a 1x1 PNG for every page below `page_count`; pages marked with
/// `failing_on` return a render error instead.
pub struct MockPdfPageRenderer {
    page_count: usize,
    failing: HashSet<usize>,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, pages: &[usize]) -> Self {
        self.failing.extend(pages);
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn render_page(
        &self,
        _pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, FigureError> {
        let reason = if page_index >= self.page_count {
            format!("no such page (mock has {})", self.page_count)
        } else if self.failing.contains(&page_index) {
            "mock render failure".to_string()
        } else {
            return Ok(minimal_png());
        };
        Err(FigureError::PageRender {
            page: page_index,
            reason,
        })
    }
}

/// 1x1 RGB PNG.
pub fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, //
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, //
        0xDE, //
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, //
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, //
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND
        0xAE, 0x42, 0x60, 0x82, //
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_size_scales_points_by_dpi() {
        let at_72 = PixelSize::for_page(595.0, 842.0, 72);
        assert_eq!((at_72.width, at_72.height, at_72.capped), (595, 842, false));

        let at_144 = PixelSize::for_page(595.0, 842.0, 144);
        assert_eq!((at_144.width, at_144.height), (1190, 1684));
    }

    #[test]
    fn pixel_size_caps_longest_edge() {
        // A3 landscape at 600 dpi is far past the cap.
        let size = PixelSize::for_page(1191.0, 842.0, 600);
        assert!(size.capped);
        assert_eq!(size.width, MAX_EDGE_PX);
        assert!(size.height < MAX_EDGE_PX);
        let ratio = size.width as f32 / size.height as f32;
        assert!((ratio - 1191.0 / 842.0).abs() < 0.01, "ratio {ratio}");
    }

    #[test]
    fn degenerate_page_gets_one_pixel() {
        let size = PixelSize::for_page(0.0, 0.0, 200);
        assert_eq!((size.width, size.height), (1, 1));
    }

    #[test]
    fn batch_failure_names_every_page() {
        let err = FigureError::DocumentOpen("bad xref".into());
        let results = fail_all(&[0, 4], &err);
        assert_eq!(results.len(), 2);
        for (result, page) in results.iter().zip([0, 4]) {
            match result {
                Err(FigureError::PageRender { page: p, reason }) => {
                    assert_eq!(*p, page);
                    assert!(reason.contains("bad xref"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn mock_batch_keeps_request_order() {
        let mock = MockPdfPageRenderer::new(4).failing_on(&[1]);
        let results = mock.render_pages(&[], &[3, 1, 0, 7], 200);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap(), &minimal_png());
        assert!(matches!(results[1], Err(FigureError::PageRender { page: 1, .. })));
        assert!(results[2].is_ok());
        assert!(matches!(results[3], Err(FigureError::PageRender { page: 7, .. })));
    }
}
