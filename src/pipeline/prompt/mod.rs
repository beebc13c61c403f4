//! Prompt assembly for the critic, vision and writer passes.
//!
//! User prompts are typed templates with a fixed set of named slots.
//! Parsing rejects unknown or unterminated slots; rendering rejects
//! templates whose slots were not all given a value, so no placeholder
//! text ever reaches a model.

pub mod builders;
pub mod defaults;
pub mod metadata;
pub mod template;

pub use builders::*;
pub use metadata::*;
pub use template::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unknown slot '{{{{{slot}}}}}' in template {template}")]
    UnknownSlot { template: String, slot: String },

    #[error("Unterminated slot at byte {offset} in template {template}")]
    UnterminatedSlot { template: String, offset: usize },

    #[error("No value for slot '{slot}' in template {template}")]
    MissingSlot { template: String, slot: String },

    #[error("Cannot read prompt file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
