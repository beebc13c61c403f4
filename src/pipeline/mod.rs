pub mod artifacts;
pub mod figures;
pub mod inference;
pub mod ingest;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod rubric;
pub mod segment;

#[cfg(test)]
pub(crate) mod fixtures;

pub use orchestrator::{FigureNotes, ReviewError, ReviewOutcome, ReviewPipeline};
