//! Figure page selection and rendering.
//!
//! Pages carrying an embedded raster image are chosen for visual review;
//! when none do, a configured fallback decides. Selected pages are rendered
//! to PNG through PDFium for the vision pass.

pub mod inspect;
pub mod pdfium;
pub mod selector;
pub mod types;

pub use inspect::*;
pub use pdfium::*;
pub use selector::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FigureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open PDF: {0}")]
    DocumentOpen(String),

    #[error("Failed to render page {page}: {reason}")]
    PageRender { page: usize, reason: String },

    #[error("PDF renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),
}
