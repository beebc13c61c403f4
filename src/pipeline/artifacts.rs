//! Persisted run outputs: fixed file names inside the run's output
//! directory, plus the `run_manifest.json` audit record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::{ModelConfig, APP_NAME, APP_VERSION};
use crate::pipeline::figures::FigureSelection;
use crate::pipeline::retrieval::{EvidenceReport, EvidenceSource, RetrievalMode};

pub const REVIEW_FILE: &str = "review.md";
pub const CRITIC_LOG_FILE: &str = "critic_issue_log.md";
pub const FIGURE_NOTES_FILE: &str = "figure_notes.txt";
pub const FIGURES_DIR: &str = "figures";
pub const EVIDENCE_FILE: &str = "evidence.md";
pub const MANIFEST_FILE: &str = "run_manifest.json";
pub const RUN_LOG_FILE: &str = "run.log";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Paths of every artifact a run may write.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Create the output directory if needed.
    pub fn create(root: &Path) -> Result<Self, ArtifactError> {
        std::fs::create_dir_all(root).map_err(|source| ArtifactError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn review(&self) -> PathBuf {
        self.root.join(REVIEW_FILE)
    }

    pub fn critic_log(&self) -> PathBuf {
        self.root.join(CRITIC_LOG_FILE)
    }

    pub fn figure_notes(&self) -> PathBuf {
        self.root.join(FIGURE_NOTES_FILE)
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.root.join(FIGURES_DIR)
    }

    pub fn evidence(&self) -> PathBuf {
        self.root.join(EVIDENCE_FILE)
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn run_log(&self) -> PathBuf {
        self.root.join(RUN_LOG_FILE)
    }
}

/// Write a text artifact, returning its path.
pub fn write_text(path: PathBuf, content: &str) -> Result<PathBuf, ArtifactError> {
    std::fs::write(&path, content).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), bytes = content.len(), "Artifact written");
    Ok(path)
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// The `evidence.md` side file: a short header and the exact block the
/// models received.
pub fn evidence_markdown(mode: RetrievalMode, report: &EvidenceReport, block: &str) -> String {
    let source = match &report.source {
        EvidenceSource::Embedding { backend } => format!("embedding ({backend})"),
        EvidenceSource::PositionalFallback { reason } => {
            format!("positional fallback ({reason})")
        }
    };
    format!(
        "# Evidence\n\n- mode: {}\n- source: {source}\n- snippets: {}\n\n{block}\n",
        mode.as_str(),
        report.snippet_count()
    )
}

// ── Manifest ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub status: StageStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputRecord {
    pub path: PathBuf,
    pub format: String,
    pub sha256: String,
    pub units: usize,
    pub text_chars: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RubricRecord {
    pub name: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRecord {
    pub mode: RetrievalMode,
    pub source: EvidenceSource,
    pub spans: usize,
    pub snippets: usize,
}

/// Audit record of one run, written even when a stage fails.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub tool: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: bool,
    pub models: ModelConfig,
    pub input: Option<InputRecord>,
    pub rubric: Option<RubricRecord>,
    pub evidence: Option<EvidenceRecord>,
    pub figures: Option<FigureSelection>,
    pub stages: Vec<StageRecord>,
    pub artifacts: Vec<PathBuf>,
    pub error: Option<String>,
}

impl RunManifest {
    pub fn new(models: &ModelConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tool: APP_NAME.to_string(),
            version: APP_VERSION.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            success: false,
            models: models.clone(),
            input: None,
            rubric: None,
            evidence: None,
            figures: None,
            stages: Vec::new(),
            artifacts: Vec::new(),
            error: None,
        }
    }

    pub fn record(&mut self, stage: &str, status: StageStatus) {
        self.stages.push(StageRecord {
            stage: stage.to_string(),
            status,
            at: Utc::now(),
        });
    }

    pub fn completed(&mut self, stage: &str) {
        self.record(stage, StageStatus::Completed);
    }

    pub fn add_artifact(&mut self, path: &Path) {
        if !self.artifacts.iter().any(|p| p == path) {
            self.artifacts.push(path.to_path_buf());
        }
    }

    /// Close the record. `failure` names the failing stage and its error.
    pub fn finish(&mut self, failure: Option<(&str, String)>) {
        self.finished_at = Some(Utc::now());
        match failure {
            None => self.success = true,
            Some((stage, error)) => {
                self.success = false;
                self.record(stage, StageStatus::Failed { error: error.clone() });
                self.error = Some(error);
            }
        }
    }

    pub fn write(&self, layout: &OutputLayout) -> Result<PathBuf, ArtifactError> {
        let json = serde_json::to_string_pretty(self)?;
        write_text(layout.manifest(), &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_uses_fixed_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("run-1");
        let layout = OutputLayout::create(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(layout.review(), root.join("review.md"));
        assert_eq!(layout.critic_log(), root.join("critic_issue_log.md"));
        assert_eq!(layout.figure_notes(), root.join("figure_notes.txt"));
        assert_eq!(layout.figures_dir(), root.join("figures"));
        assert_eq!(layout.run_log(), root.join("run.log"));
    }

    #[test]
    fn sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn manifest_records_failure() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::create(dir.path()).unwrap();
        let mut manifest = RunManifest::new(&ModelConfig::default());
        manifest.completed("rubric");
        manifest.finish(Some(("critic", "HTTP 500".into())));
        let path = manifest.write(&layout).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "HTTP 500");
        assert_eq!(json["stages"][0]["stage"], "rubric");
        assert_eq!(json["stages"][0]["status"], "completed");
        assert_eq!(json["stages"][1]["status"], "failed");
        assert_eq!(json["tool"], "manuscript-review");
    }

    #[test]
    fn artifacts_are_deduplicated() {
        let mut manifest = RunManifest::new(&ModelConfig::default());
        manifest.add_artifact(Path::new("/out/review.md"));
        manifest.add_artifact(Path::new("/out/review.md"));
        assert_eq!(manifest.artifacts.len(), 1);
    }

    #[test]
    fn evidence_markdown_names_source() {
        let report = EvidenceReport {
            source: EvidenceSource::PositionalFallback {
                reason: "offline".into(),
            },
            set: crate::pipeline::retrieval::EvidenceSet::Global(Vec::new()),
        };
        let md = evidence_markdown(RetrievalMode::Topics, &report, "BLOCK");
        assert!(md.contains("- mode: topics"));
        assert!(md.contains("- source: positional fallback (offline)"));
        assert!(md.ends_with("BLOCK\n"));
    }
}
