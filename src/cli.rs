use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    InferenceConfig, ModelConfig, PromptConfig, ReviewConfig, DEFAULT_CRITIC_MODEL,
    DEFAULT_NUM_CTX, DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P, DEFAULT_VISION_MODEL, DEFAULT_WRITER_MODEL, VISION_TEMPERATURE,
};
use crate::pipeline::figures::{
    FallbackMode, FigureConfig, DEFAULT_MAX_FIGURE_PAGES, DEFAULT_RENDER_DPI,
};
use crate::pipeline::prompt::{
    parse_meta_field, ManuscriptMetadata, DEFAULT_MANUSCRIPT_CHARS, DEFAULT_MANUSCRIPT_TYPE,
    DEFAULT_STUDY_DESIGN,
};
use crate::pipeline::retrieval::{
    EmbeddingBackend, RetrievalConfig, RetrievalMode, DEFAULT_EMBED_MODEL, DEFAULT_SNIPPET_CHARS,
    DEFAULT_TOP_K,
};
use crate::pipeline::segment::{SegmentStrategy, DEFAULT_MAX_SPANS, DEFAULT_PASSAGE_CHARS};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "manuscript-review",
    version,
    about = "Review a scientific manuscript with local models: rubric-grounded critic pass, figure pass and final report"
)]
pub struct Cli {
    /// Manuscript to review (.pdf, .docx, .txt, .md)
    #[arg(long, short)]
    pub input: PathBuf,

    /// Output directory for the review and its side artifacts
    #[arg(long, short)]
    pub out_dir: PathBuf,

    /// Rubric JSON file; repeat to merge several rubrics
    #[arg(long = "rubric", required = true)]
    pub rubrics: Vec<PathBuf>,

    // ── Manuscript metadata ───────────────────────────────
    #[arg(long, default_value = DEFAULT_MANUSCRIPT_TYPE)]
    pub manuscript_type: String,

    #[arg(long, default_value = DEFAULT_STUDY_DESIGN)]
    pub study_design: String,

    /// The manuscript develops or evaluates an AI model
    #[arg(long, default_value_t = false)]
    pub has_ai: bool,

    /// Extra `key=value` line for the manuscript context
    #[arg(long = "meta", value_parser = parse_meta_field)]
    pub meta: Vec<(String, String)>,

    // ── Models ────────────────────────────────────────────
    #[arg(long, default_value = DEFAULT_CRITIC_MODEL)]
    pub critic_model: String,

    #[arg(long, default_value = DEFAULT_WRITER_MODEL)]
    pub writer_model: String,

    #[arg(long, default_value = DEFAULT_VISION_MODEL)]
    pub vision_model: String,

    /// Skip the figure pass entirely
    #[arg(long, default_value_t = false)]
    pub no_vision: bool,

    // ── Inference ─────────────────────────────────────────
    #[arg(long, default_value = DEFAULT_OLLAMA_URL)]
    pub ollama_url: String,

    /// Permit an endpoint that is not on a loopback address
    #[arg(long, default_value_t = false)]
    pub allow_remote_endpoint: bool,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    #[arg(long, default_value_t = DEFAULT_NUM_CTX)]
    pub num_ctx: u32,

    #[arg(long, default_value_t = DEFAULT_TOP_P)]
    pub top_p: f32,

    /// Context size for the vision pass [default: min(num_ctx, 8192)]
    #[arg(long)]
    pub vision_num_ctx: Option<u32>,

    #[arg(long, default_value_t = VISION_TEMPERATURE)]
    pub vision_temperature: f32,

    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Print model output to stderr as it is generated
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    // ── Figures ───────────────────────────────────────────
    #[arg(long, default_value_t = DEFAULT_RENDER_DPI)]
    pub fig_dpi: u32,

    #[arg(long, default_value_t = DEFAULT_MAX_FIGURE_PAGES)]
    pub fig_max_pages: usize,

    /// Pages to review when no page carries an image: first_last, all, none
    #[arg(long, default_value_t = FallbackMode::FirstLast)]
    pub fig_fallback: FallbackMode,

    // ── Retrieval ─────────────────────────────────────────
    /// rubric (per-item evidence) or topics (global ranked passages)
    #[arg(long, default_value_t = RetrievalMode::Rubric)]
    pub retrieval_mode: RetrievalMode,

    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    #[arg(long, default_value_t = DEFAULT_SNIPPET_CHARS)]
    pub snippet_chars: usize,

    /// sentences or passages [default: follows --retrieval-mode]
    #[arg(long)]
    pub segmenter: Option<SegmentStrategy>,

    #[arg(long, default_value_t = DEFAULT_MAX_SPANS)]
    pub max_spans: usize,

    #[arg(long, default_value_t = DEFAULT_PASSAGE_CHARS)]
    pub passage_chars: usize,

    /// ollama, hash, onnx or none
    #[arg(long, default_value_t = EmbeddingBackend::Ollama)]
    pub embed_backend: EmbeddingBackend,

    #[arg(long, default_value = DEFAULT_EMBED_MODEL)]
    pub embed_model: String,

    /// Directory holding model.onnx and tokenizer.json (onnx backend)
    #[arg(long)]
    pub onnx_model_dir: Option<PathBuf>,

    /// Extra topic query; repeatable
    #[arg(long = "query")]
    pub extra_queries: Vec<String>,

    // ── Prompts ───────────────────────────────────────────
    /// Directory with prompt and scaffold overrides
    #[arg(long)]
    pub prompt_dir: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MANUSCRIPT_CHARS)]
    pub manuscript_chars: usize,
}

impl Cli {
    pub fn into_config(self) -> ReviewConfig {
        ReviewConfig {
            rubric_paths: self.rubrics,
            models: ModelConfig {
                critic: self.critic_model,
                writer: self.writer_model,
                vision: (!self.no_vision).then_some(self.vision_model),
            },
            inference: InferenceConfig {
                base_url: self.ollama_url,
                temperature: self.temperature,
                num_ctx: self.num_ctx,
                top_p: self.top_p,
                vision_num_ctx: self.vision_num_ctx,
                vision_temperature: self.vision_temperature,
                timeout_secs: self.timeout_secs,
                allow_remote: self.allow_remote_endpoint,
                stream: self.stream,
            },
            figures: FigureConfig {
                dpi: self.fig_dpi,
                max_pages: self.fig_max_pages,
                fallback: self.fig_fallback,
            },
            retrieval: RetrievalConfig {
                mode: self.retrieval_mode,
                top_k: self.top_k,
                snippet_chars: self.snippet_chars,
                backend: self.embed_backend,
                embed_model: self.embed_model,
                onnx_model_dir: self.onnx_model_dir,
                segmenter: self.segmenter,
                max_spans: self.max_spans,
                passage_chars: self.passage_chars,
                extra_queries: self.extra_queries,
            },
            metadata: ManuscriptMetadata {
                manuscript_type: self.manuscript_type,
                study_design: self.study_design,
                has_ai: self.has_ai,
                extra: self.meta.into_iter().collect(),
            },
            prompts: PromptConfig {
                prompt_dir: self.prompt_dir,
                manuscript_chars: self.manuscript_chars,
            },
        }
    }
}
