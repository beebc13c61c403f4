//! Span segmentation: turns loader units into sentence or passage spans.
//!
//! Both strategies keep document order, skip empty spans and stop at a hard
//! span cap (truncation, never an error).

pub mod passage;
pub mod sentence;
pub mod types;

pub use passage::*;
pub use sentence::*;
pub use types::*;
