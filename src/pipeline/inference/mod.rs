//! Inference gateway: a thin blocking client for the local Ollama chat API.
//!
//! All three model passes (critic, vision, writer) go through `LlmClient`.
//! The gateway never retries; a failed call is returned to the caller.

pub mod ollama;
pub mod types;

pub use ollama::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Cannot connect to inference endpoint at {0}")]
    Connection(String),

    #[error("Inference endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Inference transport error: {0}")]
    Transport(String),

    #[error("Failed to parse inference response: {0}")]
    ResponseParsing(String),

    #[error("Invalid endpoint URL '{0}' (expected http:// or https://)")]
    InvalidUrl(String),

    #[error("Endpoint '{0}' is not a loopback address (pass --allow-remote-endpoint to permit it)")]
    NonLocalEndpoint(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModelName(String),

    #[error("HTTP client error: {0}")]
    ClientBuild(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
