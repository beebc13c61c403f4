//! Document loading: PDF text layer, DOCX paragraphs, plain text.
//!
//! Every loader produces an ordered list of `TextUnit`s whose pointers are
//! unique within the document. Whitespace is normalised at load time so
//! downstream segmentation and embedding see stable input.

pub mod docx;
pub mod loader;
pub mod pdf;
pub mod sanitize;
pub mod types;

pub use loader::*;
pub use sanitize::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open document {path}: {reason}")]
    DocumentOpen { path: PathBuf, reason: String },
}
