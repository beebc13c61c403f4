//! Evaluation rubric: severity-tagged items with natural-language probes.
//!
//! Rubrics are JSON files loaded once per run and read-only afterwards.
//! Several files may be merged; item ids must stay unique across them.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RubricError {
    #[error("Cannot read rubric {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed rubric {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Duplicate rubric item id '{id}' (in {path})")]
    DuplicateId { id: String, path: PathBuf },

    #[error("Rubric {0} has no items")]
    EmptyRubric(PathBuf),

    #[error("Invalid rubric item '{id}' in {path}: {reason}")]
    InvalidItem {
        id: String,
        path: PathBuf,
        reason: String,
    },

    #[error("No rubric file given")]
    NoRubric,
}
