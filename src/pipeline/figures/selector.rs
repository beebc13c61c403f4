use std::path::Path;

use tracing::{info, warn};

use super::types::{
    FigureConfig, FigureSelection, PageInspector, PageSelection, PdfPageRenderer,
    SelectionReason, SkippedPage,
};
use super::FigureError;

/// File name of a rendered page, 1-based and zero-padded (`page_001.png`).
pub fn page_image_name(page_index: usize) -> String {
    format!("page_{:03}.png", page_index + 1)
}

/// Pure selection policy over per-page image flags.
///
/// Pages with images win; otherwise the fallback applies. The result is
/// capped at `max_pages` keeping ascending page order.
pub fn select_pages(has_image: &[bool], config: &FigureConfig) -> PageSelection {
    let embedded: Vec<usize> = has_image
        .iter()
        .enumerate()
        .filter_map(|(i, &img)| img.then_some(i))
        .collect();

    let (reason, mut pages) = if embedded.is_empty() {
        (
            SelectionReason::from(config.fallback),
            config.fallback.pages(has_image.len()),
        )
    } else {
        (SelectionReason::EmbeddedImages, embedded)
    };

    let candidates = pages.len();
    pages.truncate(config.max_pages);

    PageSelection {
        reason,
        page_indices: pages,
        candidates,
        page_count: has_image.len(),
    }
}

/// Chooses figure pages and renders them to PNG files.
pub struct FigureSelector<'a> {
    inspector: &'a dyn PageInspector,
    renderer: Option<&'a dyn PdfPageRenderer>,
    config: &'a FigureConfig,
}

impl<'a> FigureSelector<'a> {
    pub fn new(
        inspector: &'a dyn PageInspector,
        renderer: Option<&'a dyn PdfPageRenderer>,
        config: &'a FigureConfig,
    ) -> Self {
        Self {
            inspector,
            renderer,
            config,
        }
    }

    /// Inspect the PDF and pick pages. A corrupt document is fatal.
    pub fn select(&self, pdf_bytes: &[u8]) -> Result<PageSelection, FigureError> {
        let flags = self.inspector.pages_with_images(pdf_bytes)?;
        let selection = select_pages(&flags, self.config);

        info!(
            reason = %selection.reason,
            pages = ?selection.page_indices.iter().map(|p| p + 1).collect::<Vec<_>>(),
            candidates = selection.candidates,
            page_count = selection.page_count,
            "Figure pages selected"
        );
        if selection.candidates > selection.page_indices.len() {
            warn!(
                candidates = selection.candidates,
                max_pages = self.config.max_pages,
                "Figure page list truncated"
            );
        }
        Ok(selection)
    }

    /// Render the selected pages into `out_dir`.
    ///
    /// A page that fails to render or save is logged and recorded as skipped;
    /// only failing to create the output directory is fatal.
    pub fn render(
        &self,
        pdf_bytes: &[u8],
        selection: &PageSelection,
        out_dir: &Path,
    ) -> Result<FigureSelection, FigureError> {
        let Some(renderer) = self.renderer else {
            return Err(FigureError::RendererUnavailable(
                "no page renderer configured".into(),
            ));
        };

        let mut result = FigureSelection::unrendered(selection);
        if selection.page_indices.is_empty() {
            return Ok(result);
        }

        std::fs::create_dir_all(out_dir)?;

        let rendered = renderer.render_pages(pdf_bytes, &selection.page_indices, self.config.dpi);
        for (&page, outcome) in selection.page_indices.iter().zip(rendered) {
            let path = out_dir.join(page_image_name(page));
            match outcome.and_then(|png| write_png(&path, &png)) {
                Ok(()) => result.rendered_image_paths.push(path),
                Err(e) => {
                    warn!(page = page + 1, error = %e, "Figure page skipped");
                    result.skipped.push(SkippedPage {
                        page,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            rendered = result.rendered_image_paths.len(),
            skipped = result.skipped.len(),
            dpi = self.config.dpi,
            "Figure pages rendered"
        );
        Ok(result)
    }
}

fn write_png(path: &Path, png: &[u8]) -> Result<(), FigureError> {
    std::fs::write(path, png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::figures::{LopdfPageInspector, MockPdfPageRenderer};
    use crate::pipeline::fixtures::{build_pdf, text_only_pdf, PageSpec};
    use crate::pipeline::figures::FallbackMode;

    fn config(fallback: FallbackMode, max_pages: usize) -> FigureConfig {
        FigureConfig {
            dpi: 200,
            max_pages,
            fallback,
        }
    }

    #[test]
    fn embedded_images_select_exactly_those_pages() {
        let sel = select_pages(&[false, true, false, true], &config(FallbackMode::All, 12));
        assert_eq!(sel.reason, SelectionReason::EmbeddedImages);
        assert_eq!(sel.page_indices, vec![1, 3]);
    }

    #[test]
    fn no_images_uses_fallback() {
        let flags = [false; 5];
        let sel = select_pages(&flags, &config(FallbackMode::FirstLast, 12));
        assert_eq!(sel.reason, SelectionReason::FallbackFirstLast);
        assert_eq!(sel.page_indices, vec![0, 4]);

        let sel = select_pages(&flags, &config(FallbackMode::None, 12));
        assert_eq!(sel.reason, SelectionReason::FallbackNone);
        assert!(sel.page_indices.is_empty());

        let sel = select_pages(&flags, &config(FallbackMode::All, 12));
        assert_eq!(sel.page_indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cap_keeps_ascending_prefix() {
        let flags = [true; 20];
        let sel = select_pages(&flags, &config(FallbackMode::FirstLast, 3));
        assert_eq!(sel.page_indices, vec![0, 1, 2]);
        assert_eq!(sel.candidates, 20);
    }

    #[test]
    fn empty_document_selects_nothing() {
        let sel = select_pages(&[], &config(FallbackMode::FirstLast, 12));
        assert!(sel.page_indices.is_empty());
        assert_eq!(sel.reason, SelectionReason::FallbackFirstLast);
    }

    #[test]
    fn page_image_names_are_one_based() {
        assert_eq!(page_image_name(0), "page_001.png");
        assert_eq!(page_image_name(41), "page_042.png");
    }

    #[test]
    fn renders_selected_pages_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = build_pdf(&[PageSpec::with_image("Chart page")]);
        let cfg = FigureConfig::default();
        let renderer = MockPdfPageRenderer::new(1);
        let selector = FigureSelector::new(&LopdfPageInspector, Some(&renderer), &cfg);

        let selection = selector.select(&pdf).unwrap();
        let result = selector.render(&pdf, &selection, dir.path()).unwrap();
        assert_eq!(result.reason, SelectionReason::EmbeddedImages);
        assert_eq!(result.page_indices, vec![0]);
        assert_eq!(result.rendered_image_paths, vec![dir.path().join("page_001.png")]);
        assert!(dir.path().join("page_001.png").exists());
    }

    #[test]
    fn failing_page_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = text_only_pdf(5);
        let cfg = config(FallbackMode::FirstLast, 12);
        let renderer = MockPdfPageRenderer::new(5).failing_on(&[4]);
        let selector = FigureSelector::new(&LopdfPageInspector, Some(&renderer), &cfg);

        let selection = selector.select(&pdf).unwrap();
        let result = selector.render(&pdf, &selection, dir.path()).unwrap();
        assert_eq!(result.page_indices, vec![0, 4]);
        assert_eq!(result.rendered_image_paths.len(), 1);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].page, 4);
        assert!(!dir.path().join("page_005.png").exists());
    }

    #[test]
    fn corrupt_pdf_fails_selection() {
        let cfg = FigureConfig::default();
        let selector = FigureSelector::new(&LopdfPageInspector, None, &cfg);
        assert!(matches!(
            selector.select(b"%PDF-1.4 truncated"),
            Err(FigureError::DocumentOpen(_))
        ));
    }

    #[test]
    fn render_without_renderer_is_unavailable() {
        let cfg = FigureConfig::default();
        let selector = FigureSelector::new(&LopdfPageInspector, None, &cfg);
        let sel = select_pages(&[true], &cfg);
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            selector.render(&[], &sel, dir.path()),
            Err(FigureError::RendererUnavailable(_))
        ));
    }
}
