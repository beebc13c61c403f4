use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::rubric::Severity;
use crate::pipeline::segment::{SegmentStrategy, DEFAULT_MAX_SPANS, DEFAULT_PASSAGE_CHARS};

use super::EmbeddingError;

/// Default snippets per rubric item.
pub const DEFAULT_TOP_K: usize = 7;

/// Default snippet length in characters.
pub const DEFAULT_SNIPPET_CHARS: usize = 320;

/// Default embedding model name for the Ollama backend.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// How evidence is driven: per rubric item, or by a fixed topic-query list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Rubric,
    Topics,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rubric => "rubric",
            Self::Topics => "topics",
        }
    }

    /// Segmentation used when none is configured explicitly.
    pub fn default_segmenter(&self) -> SegmentStrategy {
        match self {
            Self::Rubric => SegmentStrategy::Sentences,
            Self::Topics => SegmentStrategy::Passages,
        }
    }
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rubric" => Ok(Self::Rubric),
            "topics" => Ok(Self::Topics),
            other => Err(format!("unknown retrieval mode '{other}' (expected rubric|topics)")),
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    Hash,
    Onnx,
    None,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Hash => "hash",
            Self::Onnx => "onnx",
            Self::None => "none",
        }
    }
}

impl fmt::Display for EmbeddingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            "onnx" => Ok(Self::Onnx),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown embedding backend '{other}' (expected ollama|hash|onnx|none)"
            )),
        }
    }
}

/// Retrieval and segmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub mode: RetrievalMode,
    pub top_k: usize,
    pub snippet_chars: usize,
    pub backend: EmbeddingBackend,
    pub embed_model: String,
    /// Directory with `model.onnx` + `tokenizer.json` for the onnx backend.
    pub onnx_model_dir: Option<PathBuf>,
    /// `None` follows the retrieval mode.
    pub segmenter: Option<SegmentStrategy>,
    pub max_spans: usize,
    pub passage_chars: usize,
    /// Appended to the built-in topic queries in topic mode.
    pub extra_queries: Vec<String>,
}

impl RetrievalConfig {
    pub fn segment_strategy(&self) -> SegmentStrategy {
        self.segmenter.unwrap_or_else(|| self.mode.default_segmenter())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            top_k: DEFAULT_TOP_K,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            backend: EmbeddingBackend::default(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            onnx_model_dir: None,
            segmenter: None,
            max_spans: DEFAULT_MAX_SPANS,
            passage_chars: DEFAULT_PASSAGE_CHARS,
            extra_queries: Vec::new(),
        }
    }
}

/// A ranked span excerpt, prefixed by its pointer when displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub pointer: String,
    pub text: String,
    pub score: f32,
}

impl fmt::Display for Snippet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pointer, self.text)
    }
}

/// Evidence gathered for one rubric item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evidence {
    pub item_id: String,
    pub label: String,
    pub severity: Severity,
    /// Score of the best snippet, 0 when there are none.
    pub score: f32,
    /// Descending score, ties in document order.
    pub snippets: Vec<Snippet>,
}

/// Where the evidence ranking came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceSource {
    Embedding { backend: String },
    PositionalFallback { reason: String },
}

impl EvidenceSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::PositionalFallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "entries", rename_all = "snake_case")]
pub enum EvidenceSet {
    /// One record per rubric item, in rubric order.
    PerItem(Vec<Evidence>),
    /// One ranked list across topic queries.
    Global(Vec<Snippet>),
}

/// Output of the retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceReport {
    pub source: EvidenceSource,
    pub set: EvidenceSet,
}

impl EvidenceReport {
    pub fn is_fallback(&self) -> bool {
        self.source.is_fallback()
    }

    pub fn snippet_count(&self) -> usize {
        match &self.set {
            EvidenceSet::PerItem(items) => items.iter().map(|e| e.snippets.len()).sum(),
            EvidenceSet::Global(snippets) => snippets.len(),
        }
    }
}

/// Turns texts into fixed-length vectors.
pub trait EmbeddingModel {
    /// Embed a batch of texts; one vector per input, in order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Backend label recorded in the evidence source.
    fn name(&self) -> String;
}
