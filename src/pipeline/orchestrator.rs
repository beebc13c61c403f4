//! Review pipeline orchestrator.
//!
//! Drives one document through a fixed sequence of stages:
//! load → segment → retrieve evidence → select figures → critic → vision →
//! writer → artifacts. Every external collaborator (LLM, embedder, page
//! inspector, page renderer, PDF text reader) is injected, so the whole
//! pipeline runs under test with mocks.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::{ConfigError, ReviewConfig};
use crate::pipeline::artifacts::{
    evidence_markdown, sha256_hex, write_text, ArtifactError, EvidenceRecord, InputRecord,
    OutputLayout, RubricRecord, RunManifest, StageStatus,
};
use crate::pipeline::figures::{
    FigureError, FigureSelection, FigureSelector, LopdfPageInspector, PageInspector,
    PageSelection, PdfPageRenderer,
};
use crate::pipeline::inference::{encode_images, ChatRequest, InferenceError, LlmClient};
use crate::pipeline::ingest::{DocumentFormat, DocumentLoader, LoadError, LoadedDocument};
use crate::pipeline::prompt::defaults::{NO_IMAGES_NOTES, VISION_SKIPPED_NOTES};
use crate::pipeline::prompt::{PromptSet, ReviewContext, TemplateError};
use crate::pipeline::retrieval::{
    build_topic_queries, render_evidence_block, EmbeddingModel, EvidenceReport,
    EvidenceRetriever, EvidenceSource, RetrievalMode,
};
use crate::pipeline::rubric::{load_rubrics, Rubric, RubricError};
use crate::pipeline::segment::{segmenter_for, Span};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A failed run, named by the stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Configuration invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Rubric stage failed: {0}")]
    Rubric(#[from] RubricError),

    #[error("Load stage failed: {0}")]
    Load(#[from] LoadError),

    #[error("Figure stage failed: {0}")]
    Figures(#[from] FigureError),

    #[error("Critic pass failed: {0}")]
    Critic(#[source] InferenceError),

    #[error("Vision pass failed: {0}")]
    Vision(#[source] InferenceError),

    #[error("Writer pass failed: {0}")]
    Writer(#[source] InferenceError),

    #[error("Prompt template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Artifact write failed: {0}")]
    Artifact(#[from] ArtifactError),
}

impl ReviewError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Rubric(_) => "rubric",
            Self::Load(_) => "load",
            Self::Figures(_) => "figures",
            Self::Critic(_) => "critic",
            Self::Vision(_) => "vision",
            Self::Writer(_) => "writer",
            Self::Template(_) => "prompts",
            Self::Artifact(_) => "artifacts",
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Output of the vision stage. The writer receives `text()` in every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum FigureNotes {
    Generated(String),
    /// No vision model configured for this run.
    VisionSkipped,
    /// Vision requested but no page image was available.
    NoImages,
}

impl FigureNotes {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) => text,
            Self::VisionSkipped => VISION_SKIPPED_NOTES,
            Self::NoImages => NO_IMAGES_NOTES,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub run_id: Uuid,
    pub out_dir: PathBuf,
    pub review_path: PathBuf,
    pub critic_log_path: PathBuf,
    pub figure_notes_path: PathBuf,
    pub manifest_path: PathBuf,
    pub evidence: EvidenceReport,
    pub figures: FigureSelection,
    pub figure_notes: FigureNotes,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct ReviewPipeline {
    config: ReviewConfig,
    llm: Arc<dyn LlmClient + Send + Sync>,
    embedder: Box<dyn EmbeddingModel + Send + Sync>,
    loader: DocumentLoader,
    inspector: Box<dyn PageInspector + Send + Sync>,
    renderer: Option<Box<dyn PdfPageRenderer + Send + Sync>>,
    token_sink: Option<Sender<String>>,
}

impl ReviewPipeline {
    /// Pipeline with the default loader and lopdf page inspector and no
    /// page renderer.
    pub fn new(
        config: ReviewConfig,
        llm: Arc<dyn LlmClient + Send + Sync>,
        embedder: Box<dyn EmbeddingModel + Send + Sync>,
    ) -> Self {
        Self {
            config,
            llm,
            embedder,
            loader: DocumentLoader::default(),
            inspector: Box::new(LopdfPageInspector),
            renderer: None,
            token_sink: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn PdfPageRenderer + Send + Sync>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_inspector(mut self, inspector: Box<dyn PageInspector + Send + Sync>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Receives streamed text when `inference.stream` is on.
    pub fn with_token_sink(mut self, token_tx: Sender<String>) -> Self {
        self.token_sink = Some(token_tx);
        self
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    /// Run the whole pipeline for `input`, writing artifacts to `out_dir`.
    ///
    /// `run_manifest.json` is written whether or not the run succeeds.
    /// Artifacts from completed stages are left in place on failure.
    pub fn run(&self, input: &Path, out_dir: &Path) -> Result<ReviewOutcome, ReviewError> {
        let layout = OutputLayout::create(out_dir)?;
        let mut manifest = RunManifest::new(&self.config.models);

        let result = self.execute(input, &layout, &mut manifest);

        match &result {
            Ok(_) => manifest.finish(None),
            Err(e) => manifest.finish(Some((e.stage(), e.to_string()))),
        }
        if layout.run_log().exists() {
            manifest.add_artifact(&layout.run_log());
        }

        match (manifest.write(&layout), result) {
            (Ok(manifest_path), Ok(mut outcome)) => {
                outcome.manifest_path = manifest_path;
                Ok(outcome)
            }
            (Err(e), Ok(_)) => Err(e.into()),
            (Err(write_err), Err(run_err)) => {
                warn!(error = %write_err, "Run manifest could not be written");
                Err(run_err)
            }
            (Ok(_), Err(run_err)) => Err(run_err),
        }
    }

    fn execute(
        &self,
        input: &Path,
        layout: &OutputLayout,
        manifest: &mut RunManifest,
    ) -> Result<ReviewOutcome, ReviewError> {
        let config = &self.config;
        config.validate()?;

        // Nothing below touches the network until the critic pass, so an
        // unsupported file or a bad rubric fails before any model call.
        DocumentFormat::from_path(input)?;

        let rubric = load_rubrics(&config.rubric_paths)?;
        manifest.rubric = Some(RubricRecord {
            name: rubric.name.clone(),
            item_ids: rubric.item_ids().iter().map(|s| s.to_string()).collect(),
        });
        manifest.completed("rubric");

        let prompts = PromptSet::load(config.resolved_prompt_dir().as_deref())?;

        let doc = self.loader.load(input)?;
        manifest.input = Some(InputRecord {
            path: doc.path.clone(),
            format: doc.format.as_str().to_string(),
            sha256: sha256_hex(&doc.bytes),
            units: doc.units.len(),
            text_chars: doc.text_chars(),
        });
        manifest.completed("load");

        let strategy = config.retrieval.segment_strategy();
        let spans = segmenter_for(strategy, config.retrieval.max_spans, config.retrieval.passage_chars)
            .segment(&doc.units);
        info!(strategy = %strategy, spans = spans.len(), "Document segmented");
        manifest.completed("segment");

        let evidence = self.retrieve(&rubric, &spans);
        let evidence_block = render_evidence_block(&evidence);
        manifest.evidence = Some(EvidenceRecord {
            mode: config.retrieval.mode,
            source: evidence.source.clone(),
            spans: spans.len(),
            snippets: evidence.snippet_count(),
        });
        let evidence_path = write_text(
            layout.evidence(),
            &evidence_markdown(config.retrieval.mode, &evidence, &evidence_block),
        )?;
        manifest.add_artifact(&evidence_path);
        if let Some(reason) = fallback_reason(&evidence) {
            manifest.record("retrieve", StageStatus::Skipped { reason });
        } else {
            manifest.completed("retrieve");
        }

        let figures = self.figures(&doc, layout)?;
        for path in &figures.rendered_image_paths {
            manifest.add_artifact(path);
        }
        manifest.figures = Some(figures.clone());
        manifest.completed("figures");

        let ctx = ReviewContext::new(
            &config.metadata,
            rubric.guidance(),
            evidence_block,
            &doc.full_text(),
            config.prompts.manuscript_chars,
        );

        // Critic
        let critic_log = {
            let model = &config.models.critic;
            let _span = info_span!("critic", model = %model).entered();
            let request = ChatRequest::new(
                model,
                &prompts.critic_system,
                &prompts.critic_user(&ctx)?,
                config.inference.text_options(),
            );
            let text = self.chat(&request).map_err(ReviewError::Critic)?;
            info!(chars = text.chars().count(), "Critic pass complete");
            text
        };
        let critic_log_path = write_text(layout.critic_log(), &critic_log)?;
        manifest.add_artifact(&critic_log_path);
        manifest.completed("critic");

        // Vision
        let figure_notes = self.vision(&prompts, &ctx, &figures)?;
        let figure_notes_path = write_text(layout.figure_notes(), figure_notes.text())?;
        manifest.add_artifact(&figure_notes_path);
        match &figure_notes {
            FigureNotes::Generated(_) => manifest.completed("vision"),
            FigureNotes::VisionSkipped => manifest.record(
                "vision",
                StageStatus::Skipped {
                    reason: "no vision model configured".into(),
                },
            ),
            FigureNotes::NoImages => manifest.record(
                "vision",
                StageStatus::Skipped {
                    reason: "no page images available".into(),
                },
            ),
        }

        // Writer
        let review = {
            let model = &config.models.writer;
            let _span = info_span!("writer", model = %model).entered();
            let request = ChatRequest::new(
                model,
                &prompts.writer_system,
                &prompts.writer_user(&ctx, &critic_log, figure_notes.text())?,
                config.inference.text_options(),
            );
            let text = self.chat(&request).map_err(ReviewError::Writer)?;
            info!(chars = text.chars().count(), "Writer pass complete");
            text
        };
        let review_path = write_text(layout.review(), &review)?;
        manifest.add_artifact(&review_path);
        manifest.completed("writer");

        info!(
            run_id = %manifest.run_id,
            out_dir = %layout.root().display(),
            "Review complete"
        );

        Ok(ReviewOutcome {
            run_id: manifest.run_id,
            out_dir: layout.root().to_path_buf(),
            review_path,
            critic_log_path,
            figure_notes_path,
            manifest_path: layout.manifest(),
            evidence,
            figures,
            figure_notes,
        })
    }

    fn retrieve(&self, rubric: &Rubric, spans: &[Span]) -> EvidenceReport {
        let config = &self.config;
        let retriever = EvidenceRetriever::new(&*self.embedder, &config.retrieval);
        match config.retrieval.mode {
            RetrievalMode::Rubric => retriever.for_rubric(rubric, spans),
            RetrievalMode::Topics => {
                let queries = build_topic_queries(&config.metadata, &config.retrieval.extra_queries);
                retriever.for_topics(&queries, spans)
            }
        }
    }

    /// Select figure pages; render them only when a vision pass will use them.
    fn figures(
        &self,
        doc: &LoadedDocument,
        layout: &OutputLayout,
    ) -> Result<FigureSelection, ReviewError> {
        let config = &self.config;
        if !doc.format.is_pdf() {
            let selection = PageSelection::empty(config.figures.fallback);
            info!(format = doc.format.as_str(), "No pages to inspect for figures");
            return Ok(FigureSelection::unrendered(&selection));
        }

        let renderer = self
            .renderer
            .as_deref()
            .map(|r| r as &dyn PdfPageRenderer);
        let selector = FigureSelector::new(&*self.inspector, renderer, &config.figures);
        let selection = selector.select(&doc.bytes)?;

        if config.models.vision.is_none() {
            return Ok(FigureSelection::unrendered(&selection));
        }
        if renderer.is_none() {
            warn!("No page renderer available; figure pages will not be rendered");
            return Ok(FigureSelection::unrendered(&selection));
        }

        let figures = selector.render(&doc.bytes, &selection, &layout.figures_dir())?;
        info!(summary = %figures.summary(), "Figure pages ready");
        Ok(figures)
    }

    fn vision(
        &self,
        prompts: &PromptSet,
        ctx: &ReviewContext,
        figures: &FigureSelection,
    ) -> Result<FigureNotes, ReviewError> {
        let config = &self.config;
        let Some(model) = config.models.vision.as_deref() else {
            info!("Vision pass skipped: no vision model configured");
            return Ok(FigureNotes::VisionSkipped);
        };
        if !figures.has_images() {
            warn!(summary = %figures.summary(), "Vision pass has no images");
            return Ok(FigureNotes::NoImages);
        }

        let _span = info_span!("vision", model = %model).entered();
        let images =
            encode_images(&figures.rendered_image_paths).map_err(ReviewError::Vision)?;
        let request = ChatRequest::with_images(
            model,
            &prompts.vision_system,
            &prompts.vision_user(ctx, &figures.summary())?,
            images,
            config.inference.vision_options(),
        );
        let text = self.chat(&request).map_err(ReviewError::Vision)?;
        info!(
            images = request.image_count(),
            chars = text.chars().count(),
            "Vision pass complete"
        );
        Ok(FigureNotes::Generated(text))
    }

    fn chat(&self, request: &ChatRequest) -> Result<String, InferenceError> {
        match &self.token_sink {
            Some(tx) if self.config.inference.stream => {
                let text = self.llm.chat_streaming(request, tx.clone())?;
                let _ = tx.send("\n".to_string());
                Ok(text)
            }
            _ => self.llm.chat(request),
        }
    }
}

fn fallback_reason(report: &EvidenceReport) -> Option<String> {
    match &report.source {
        EvidenceSource::PositionalFallback { reason } => {
            Some(format!("positional fallback: {reason}"))
        }
        _ => None,
    }
}
