use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::FigureError;

/// Default rendering DPI for figure pages.
pub const DEFAULT_RENDER_DPI: u32 = 200;

/// Default maximum number of rendered figure pages.
pub const DEFAULT_MAX_FIGURE_PAGES: usize = 12;

/// Page policy applied when no page carries an embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    #[default]
    FirstLast,
    All,
    None,
}

impl FallbackMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstLast => "first_last",
            Self::All => "all",
            Self::None => "none",
        }
    }

    /// 0-based pages chosen by this policy for a document of `page_count` pages.
    pub fn pages(&self, page_count: usize) -> Vec<usize> {
        if page_count == 0 {
            return Vec::new();
        }
        match self {
            Self::None => Vec::new(),
            Self::All => (0..page_count).collect(),
            Self::FirstLast if page_count == 1 => vec![0],
            Self::FirstLast => vec![0, page_count - 1],
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_last" => Ok(Self::FirstLast),
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown fallback mode '{other}' (expected first_last|all|none)"
            )),
        }
    }
}

/// Why a set of pages was selected. Serialized as the audit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    EmbeddedImages,
    FallbackFirstLast,
    FallbackAll,
    FallbackNone,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmbeddedImages => "embedded_images",
            Self::FallbackFirstLast => "fallback_first_last",
            Self::FallbackAll => "fallback_all",
            Self::FallbackNone => "fallback_none",
        }
    }
}

impl From<FallbackMode> for SelectionReason {
    fn from(mode: FallbackMode) -> Self {
        match mode {
            FallbackMode::FirstLast => Self::FallbackFirstLast,
            FallbackMode::All => Self::FallbackAll,
            FallbackMode::None => Self::FallbackNone,
        }
    }
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Figure selection and rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureConfig {
    pub dpi: u32,
    pub max_pages: usize,
    pub fallback: FallbackMode,
}

impl FigureConfig {
    /// Render scale relative to the 72-point PDF baseline.
    pub fn zoom(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_RENDER_DPI,
            max_pages: DEFAULT_MAX_FIGURE_PAGES,
            fallback: FallbackMode::default(),
        }
    }
}

/// Pages chosen for visual review, before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSelection {
    pub reason: SelectionReason,
    /// Ascending 0-based page indices, after the max-pages cap.
    pub page_indices: Vec<usize>,
    /// Number of candidate pages before the cap.
    pub candidates: usize,
    pub page_count: usize,
}

impl PageSelection {
    /// Selection for a document without pages (non-PDF input).
    pub fn empty(fallback: FallbackMode) -> Self {
        Self {
            reason: fallback.into(),
            page_indices: Vec::new(),
            candidates: 0,
            page_count: 0,
        }
    }
}

/// A selected page that could not be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPage {
    /// 0-based page index.
    pub page: usize,
    pub reason: String,
}

/// Final figure selection with rendered image files.
#[derive(Debug, Clone, Serialize)]
pub struct FigureSelection {
    pub reason: SelectionReason,
    pub page_indices: Vec<usize>,
    pub rendered_image_paths: Vec<PathBuf>,
    pub skipped: Vec<SkippedPage>,
}

impl FigureSelection {
    /// Selection recorded without rendering (no vision model configured).
    pub fn unrendered(selection: &PageSelection) -> Self {
        Self {
            reason: selection.reason,
            page_indices: selection.page_indices.clone(),
            rendered_image_paths: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn has_images(&self) -> bool {
        !self.rendered_image_paths.is_empty()
    }

    /// One-line summary used in logs and prompts (1-based page numbers).
    pub fn summary(&self) -> String {
        let pages: Vec<String> = self.page_indices.iter().map(|p| (p + 1).to_string()).collect();
        format!(
            "reason={} pages=[{}] images={} skipped={}",
            self.reason,
            pages.join(", "),
            self.rendered_image_paths.len(),
            self.skipped.len()
        )
    }
}

/// Reports, per page, whether it carries at least one embedded raster image.
pub trait PageInspector {
    fn pages_with_images(&self, pdf_bytes: &[u8]) -> Result<Vec<bool>, FigureError>;
}

/// Renders PDF pages to PNG bytes.
pub trait PdfPageRenderer {
    /// Render one 0-based page at the given DPI.
    fn render_page(&self, pdf_bytes: &[u8], page_index: usize, dpi: u32)
        -> Result<Vec<u8>, FigureError>;

    /// Render several pages; one result per requested page, in order.
    fn render_pages(
        &self,
        pdf_bytes: &[u8],
        page_indices: &[usize],
        dpi: u32,
    ) -> Vec<Result<Vec<u8>, FigureError>> {
        page_indices
            .iter()
            .map(|&p| self.render_page(pdf_bytes, p, dpi))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_first_last() {
        assert_eq!(FallbackMode::FirstLast.pages(5), vec![0, 4]);
        assert_eq!(FallbackMode::FirstLast.pages(1), vec![0]);
        assert!(FallbackMode::FirstLast.pages(0).is_empty());
    }

    #[test]
    fn fallback_all_and_none() {
        assert_eq!(FallbackMode::All.pages(3), vec![0, 1, 2]);
        assert!(FallbackMode::None.pages(3).is_empty());
    }

    #[test]
    fn reason_strings() {
        assert_eq!(SelectionReason::EmbeddedImages.as_str(), "embedded_images");
        assert_eq!(SelectionReason::from(FallbackMode::FirstLast).as_str(), "fallback_first_last");
        assert_eq!(SelectionReason::from(FallbackMode::None).to_string(), "fallback_none");
        assert_eq!(
            serde_json::to_string(&SelectionReason::FallbackAll).unwrap(),
            "\"fallback_all\""
        );
    }

    #[test]
    fn zoom_scales_72_point_baseline() {
        let cfg = FigureConfig {
            dpi: 144,
            ..FigureConfig::default()
        };
        assert!((cfg.zoom() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn summary_uses_one_based_pages() {
        let sel = FigureSelection {
            reason: SelectionReason::FallbackFirstLast,
            page_indices: vec![0, 4],
            rendered_image_paths: vec![PathBuf::from("page_001.png")],
            skipped: vec![SkippedPage {
                page: 4,
                reason: "boom".into(),
            }],
        };
        assert_eq!(
            sel.summary(),
            "reason=fallback_first_last pages=[1, 5] images=1 skipped=1"
        );
    }

    #[test]
    fn fallback_mode_parses() {
        assert_eq!("all".parse::<FallbackMode>().unwrap(), FallbackMode::All);
        assert!("last".parse::<FallbackMode>().is_err());
    }
}
