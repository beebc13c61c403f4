use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::figures::FigureConfig;
use crate::pipeline::inference::{validate_base_url, validate_model_name, ChatOptions, InferenceError};
use crate::pipeline::prompt::{ManuscriptMetadata, DEFAULT_MANUSCRIPT_CHARS};
use crate::pipeline::retrieval::{EmbeddingBackend, RetrievalConfig};

/// Application-level constants
pub const APP_NAME: &str = "manuscript-review";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_CRITIC_MODEL: &str = "deepseek-r1:70b";
pub const DEFAULT_WRITER_MODEL: &str = "llama3.3:70b";
pub const DEFAULT_VISION_MODEL: &str = "qwen2.5vl:7b";

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_NUM_CTX: u32 = 16384;
pub const DEFAULT_TOP_P: f32 = 0.9;
/// Vision calls never ask for a larger context than this.
pub const VISION_NUM_CTX_CAP: u32 = 8192;
pub const VISION_TEMPERATURE: f32 = 0.2;
/// Local 70B models can take tens of minutes per pass.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 3600;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info"
}

/// Per-user configuration directory (`<config>/manuscript-review`).
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Prompt directory picked up when `--prompt-dir` is not given, if it exists.
pub fn default_prompt_dir() -> Option<PathBuf> {
    app_config_dir()
        .map(|d| d.join("prompts"))
        .filter(|d| d.is_dir())
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field}: {source}")]
    Inference {
        field: &'static str,
        #[source]
        source: InferenceError,
    },

    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("At least one rubric file is required")]
    NoRubric,
}

// ── Sections ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub critic: String,
    pub writer: String,
    /// `None` skips the vision pass.
    pub vision: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            critic: DEFAULT_CRITIC_MODEL.to_string(),
            writer: DEFAULT_WRITER_MODEL.to_string(),
            vision: Some(DEFAULT_VISION_MODEL.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub temperature: f32,
    pub num_ctx: u32,
    pub top_p: f32,
    /// `None` means `min(num_ctx, 8192)`.
    pub vision_num_ctx: Option<u32>,
    pub vision_temperature: f32,
    pub timeout_secs: u64,
    pub allow_remote: bool,
    pub stream: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            num_ctx: DEFAULT_NUM_CTX,
            top_p: DEFAULT_TOP_P,
            vision_num_ctx: None,
            vision_temperature: VISION_TEMPERATURE,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            allow_remote: false,
            stream: false,
        }
    }
}

impl InferenceConfig {
    /// Options for the critic and writer passes.
    pub fn text_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.temperature,
            num_ctx: self.num_ctx,
            top_p: self.top_p,
        }
    }

    pub fn vision_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.vision_temperature,
            num_ctx: self
                .vision_num_ctx
                .unwrap_or_else(|| self.num_ctx.min(VISION_NUM_CTX_CAP)),
            top_p: self.top_p,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub prompt_dir: Option<PathBuf>,
    pub manuscript_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt_dir: None,
            manuscript_chars: DEFAULT_MANUSCRIPT_CHARS,
        }
    }
}

/// Everything one review run needs, passed to the orchestrator explicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub rubric_paths: Vec<PathBuf>,
    pub models: ModelConfig,
    pub inference: InferenceConfig,
    pub figures: FigureConfig,
    pub retrieval: RetrievalConfig,
    pub metadata: ManuscriptMetadata,
    pub prompts: PromptConfig,
}

impl ReviewConfig {
    /// Check every field that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rubric_paths.is_empty() {
            return Err(ConfigError::NoRubric);
        }

        let inference = |field: &'static str| move |source| ConfigError::Inference { field, source };
        validate_base_url(&self.inference.base_url, self.inference.allow_remote)
            .map_err(inference("endpoint"))?;
        validate_model_name(&self.models.critic).map_err(inference("critic model"))?;
        validate_model_name(&self.models.writer).map_err(inference("writer model"))?;
        if let Some(vision) = &self.models.vision {
            validate_model_name(vision).map_err(inference("vision model"))?;
        }
        if self.retrieval.backend == EmbeddingBackend::Ollama {
            validate_model_name(&self.retrieval.embed_model).map_err(inference("embedding model"))?;
        }

        let range = |field: &'static str, ok: bool, reason: String| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field, reason })
            }
        };
        let t = self.inference.temperature;
        range("temperature", (0.0..=2.0).contains(&t), format!("{t} not in [0, 2]"))?;
        let p = self.inference.top_p;
        range("top_p", p > 0.0 && p <= 1.0, format!("{p} not in (0, 1]"))?;
        range("num_ctx", self.inference.num_ctx >= 512, format!("{} < 512", self.inference.num_ctx))?;
        range("timeout", self.inference.timeout_secs > 0, "must be positive".into())?;
        let dpi = self.figures.dpi;
        range("dpi", (36..=600).contains(&dpi), format!("{dpi} not in [36, 600]"))?;
        range("top_k", self.retrieval.top_k > 0, "must be positive".into())?;
        range("snippet_chars", self.retrieval.snippet_chars > 0, "must be positive".into())?;
        range("max_spans", self.retrieval.max_spans > 0, "must be positive".into())?;
        range(
            "passage_chars",
            self.retrieval.passage_chars >= 100,
            format!("{} < 100", self.retrieval.passage_chars),
        )?;
        range(
            "manuscript_chars",
            self.prompts.manuscript_chars > 0,
            "must be positive".into(),
        )?;
        Ok(())
    }

    /// Explicit prompt directory, else the per-user default if present.
    pub fn resolved_prompt_dir(&self) -> Option<PathBuf> {
        self.prompts.prompt_dir.clone().or_else(default_prompt_dir)
    }
}
