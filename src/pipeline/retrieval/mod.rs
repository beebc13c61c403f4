//! Evidence retrieval: embeds rubric probes (or topic queries) and document
//! spans, ranks spans by cosine similarity and keeps the top-k as evidence.
//!
//! When the embedding backend fails the retriever falls back to the first
//! spans in document order with a zero score, and says so in its output.

pub mod block;
pub mod embedder;
pub mod evidence;
pub mod queries;
pub mod similarity;
pub mod types;

pub use block::*;
pub use embedder::*;
pub use evidence::*;
pub use queries::*;
pub use similarity::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Embedding backend error: {0}")]
    Backend(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
