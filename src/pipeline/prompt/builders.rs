use std::path::Path;

use tracing::{debug, info};

use super::defaults;
use super::metadata::ManuscriptMetadata;
use super::template::{PromptTemplate, Slot, SlotValues};
use super::TemplateError;

/// Character budget for the manuscript text in critic/writer prompts.
pub const DEFAULT_MANUSCRIPT_CHARS: usize = 28_000;

pub const CRITIC_SLOTS: &[Slot] = &[
    Slot::ManuscriptContext,
    Slot::ReviewerTemplate,
    Slot::NomenclatureGuide,
    Slot::RubricGuidance,
    Slot::Evidence,
    Slot::Manuscript,
];

pub const WRITER_SLOTS: &[Slot] = &[
    Slot::ManuscriptContext,
    Slot::ReviewerTemplate,
    Slot::NomenclatureGuide,
    Slot::RubricGuidance,
    Slot::Evidence,
    Slot::Manuscript,
    Slot::CriticLog,
    Slot::FigureNotes,
];

pub const VISION_SLOTS: &[Slot] = &[Slot::ManuscriptContext, Slot::FigureSelection];

// Override file names inside a prompt directory.
const CRITIC_SYSTEM_FILE: &str = "critic_prompt.txt";
const WRITER_SYSTEM_FILE: &str = "writer_prompt.txt";
const VISION_SYSTEM_FILE: &str = "vlm_prompt.txt";
const CRITIC_USER_FILE: &str = "critic_user.tmpl";
const WRITER_USER_FILE: &str = "writer_user.tmpl";
const VISION_USER_FILE: &str = "vlm_user.tmpl";
const REVIEWER_TEMPLATE_FILE: &str = "reviewer_template_original_research.txt";
const NOMENCLATURE_FILE: &str = "nuclear_nomenclature_guide.txt";

/// System prompts, user templates and scaffolds for one run.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub critic_system: String,
    pub writer_system: String,
    pub vision_system: String,
    critic_user: PromptTemplate,
    writer_user: PromptTemplate,
    vision_user: PromptTemplate,
    pub reviewer_template: Option<String>,
    pub nomenclature_guide: Option<String>,
}

impl PromptSet {
    /// Built-in prompts only.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::load(None)
    }

    /// Built-in prompts, with any file present in `dir` taking precedence.
    ///
    /// Templates from the directory are validated here, so a bad slot
    /// fails the run before any model call.
    pub fn load(dir: Option<&Path>) -> Result<Self, TemplateError> {
        let read = |file: &str| read_override(dir, file);
        let text_or = |file: &str, fallback: &str| -> Result<String, TemplateError> {
            Ok(read(file)?.unwrap_or_else(|| fallback.to_string()))
        };
        let template = |file: &str, fallback: &str, allowed: &[Slot]| -> Result<PromptTemplate, TemplateError> {
            let source = text_or(file, fallback)?;
            PromptTemplate::parse(file, &source, allowed)
        };

        let set = Self {
            critic_system: text_or(CRITIC_SYSTEM_FILE, defaults::CRITIC_SYSTEM)?,
            writer_system: text_or(WRITER_SYSTEM_FILE, defaults::WRITER_SYSTEM)?,
            vision_system: text_or(VISION_SYSTEM_FILE, defaults::VISION_SYSTEM)?,
            critic_user: template(CRITIC_USER_FILE, defaults::CRITIC_USER, CRITIC_SLOTS)?,
            writer_user: template(WRITER_USER_FILE, defaults::WRITER_USER, WRITER_SLOTS)?,
            vision_user: template(VISION_USER_FILE, defaults::VISION_USER, VISION_SLOTS)?,
            reviewer_template: read(REVIEWER_TEMPLATE_FILE)?,
            nomenclature_guide: read(NOMENCLATURE_FILE)?,
        };

        if let Some(dir) = dir {
            info!(
                dir = %dir.display(),
                reviewer_template = set.reviewer_template.is_some(),
                nomenclature_guide = set.nomenclature_guide.is_some(),
                "Prompt directory loaded"
            );
        }
        Ok(set)
    }

    pub fn critic_user(&self, ctx: &ReviewContext) -> Result<String, TemplateError> {
        self.critic_user.render(&self.shared_values(ctx))
    }

    pub fn writer_user(
        &self,
        ctx: &ReviewContext,
        critic_log: &str,
        figure_notes: &str,
    ) -> Result<String, TemplateError> {
        let values = self
            .shared_values(ctx)
            .with(Slot::CriticLog, critic_log.trim())
            .with(Slot::FigureNotes, figure_notes.trim());
        self.writer_user.render(&values)
    }

    pub fn vision_user(
        &self,
        ctx: &ReviewContext,
        figure_summary: &str,
    ) -> Result<String, TemplateError> {
        let values = SlotValues::new()
            .with(Slot::ManuscriptContext, ctx.metadata.context_lines())
            .with(Slot::FigureSelection, figure_summary);
        self.vision_user.render(&values)
    }

    fn shared_values(&self, ctx: &ReviewContext) -> SlotValues {
        let scaffold = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(defaults::NO_SCAFFOLD)
                .to_string()
        };
        SlotValues::new()
            .with(Slot::ManuscriptContext, ctx.metadata.context_lines())
            .with(Slot::ReviewerTemplate, scaffold(&self.reviewer_template))
            .with(Slot::NomenclatureGuide, scaffold(&self.nomenclature_guide))
            .with(Slot::RubricGuidance, ctx.rubric_guidance.clone())
            .with(Slot::Evidence, ctx.evidence.clone())
            .with(Slot::Manuscript, ctx.manuscript.clone())
    }
}

fn read_override(dir: Option<&Path>, file: &str) -> Result<Option<String>, TemplateError> {
    let Some(dir) = dir else {
        return Ok(None);
    };
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(path = %path.display(), "Prompt override");
    Ok(Some(text))
}

/// Inputs shared by the critic, vision and writer prompts.
#[derive(Debug, Clone)]
pub struct ReviewContext<'a> {
    pub metadata: &'a ManuscriptMetadata,
    pub rubric_guidance: String,
    pub evidence: String,
    /// Already cut to the manuscript budget.
    pub manuscript: String,
}

impl<'a> ReviewContext<'a> {
    pub fn new(
        metadata: &'a ManuscriptMetadata,
        rubric_guidance: String,
        evidence: String,
        full_text: &str,
        manuscript_chars: usize,
    ) -> Self {
        Self {
            metadata,
            rubric_guidance,
            evidence,
            manuscript: bound_manuscript(full_text, manuscript_chars),
        }
    }
}

/// Cut the manuscript to `max_chars` characters, appending a marker that
/// states how much was kept.
pub fn bound_manuscript(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    format!(
        "{}\n\n[... manuscript truncated: {max_chars} of {total} characters shown ...]",
        &text[..cut]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(meta: &ManuscriptMetadata) -> ReviewContext<'_> {
        ReviewContext::new(
            meta,
            "- [MAJOR] Sample size (power)".into(),
            "[EVIDENCE 1] ([p1]c1, score=0.900)\nMethods".into(),
            "Full manuscript text.",
            DEFAULT_MANUSCRIPT_CHARS,
        )
    }

    #[test]
    fn builtin_prompts_parse() {
        let set = PromptSet::builtin().unwrap();
        assert!(set.critic_system.contains("Issue Log"));
        assert!(set.reviewer_template.is_none());
    }

    #[test]
    fn critic_prompt_has_all_sections_and_no_placeholders() {
        let meta = ManuscriptMetadata::default();
        let prompt = PromptSet::builtin().unwrap().critic_user(&ctx(&meta)).unwrap();
        for section in [
            "MANUSCRIPT CONTEXT\n- type: original_research",
            "- ai_related: false",
            "INTERNAL SCAFFOLDS (do not output as Q&A)",
            "RUBRIC ITEMS (by severity)\n- [MAJOR] Sample size (power)",
            "EVIDENCE SNIPPETS (most relevant passages)\n[EVIDENCE 1]",
            "FULL MANUSCRIPT (for context; do not quote long passages)\nFull manuscript text.",
        ] {
            assert!(prompt.contains(section), "missing: {section}");
        }
        assert!(prompt.contains(defaults::NO_SCAFFOLD));
        assert!(!prompt.contains("{{"));
        assert!(!prompt.contains("CRITIC ISSUE LOG"));
    }

    #[test]
    fn writer_prompt_includes_critic_log_and_figure_notes() {
        let meta = ManuscriptMetadata::default();
        let prompt = PromptSet::builtin()
            .unwrap()
            .writer_user(&ctx(&meta), "- Major: no power analysis\n", defaults::NO_IMAGES_NOTES)
            .unwrap();
        assert!(prompt.contains("CRITIC ISSUE LOG (PASS 1)\n- Major: no power analysis\n"));
        assert!(prompt.contains(&format!("FIGURE/TABLE NOTES (VLM)\n{}", defaults::NO_IMAGES_NOTES)));
    }

    #[test]
    fn vision_prompt_names_selection() {
        let meta = ManuscriptMetadata::default();
        let prompt = PromptSet::builtin()
            .unwrap()
            .vision_user(&ctx(&meta), "reason=embedded_images pages=[1]")
            .unwrap();
        assert!(prompt.contains("(reason=embedded_images pages=[1])"));
    }

    #[test]
    fn extra_metadata_fields_are_rendered() {
        let mut meta = ManuscriptMetadata::default();
        meta.extra.insert("journal".into(), "EJNMMI".into());
        let prompt = PromptSet::builtin().unwrap().critic_user(&ctx(&meta)).unwrap();
        assert!(prompt.contains("- journal: EJNMMI"));
    }

    #[test]
    fn directory_overrides_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("critic_prompt.txt"), "Custom critic.").unwrap();
        std::fs::write(dir.path().join("nuclear_nomenclature_guide.txt"), "Use [18F]FDG.").unwrap();
        std::fs::write(
            dir.path().join("critic_user.tmpl"),
            "CTX {{manuscript_context}}\nNOM {{nomenclature_guide}}",
        )
        .unwrap();

        let set = PromptSet::load(Some(dir.path())).unwrap();
        assert_eq!(set.critic_system, "Custom critic.");
        assert!(set.writer_system.contains("PASS 2 WRITER"));

        let meta = ManuscriptMetadata::default();
        let prompt = set.critic_user(&ctx(&meta)).unwrap();
        assert!(prompt.starts_with("CTX - type: original_research"));
        assert!(prompt.ends_with("NOM Use [18F]FDG."));
    }

    #[test]
    fn override_with_foreign_slot_fails_at_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("critic_user.tmpl"), "{{critic_log}}").unwrap();
        let err = PromptSet::load(Some(dir.path())).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownSlot { ref template, .. } if template == "critic_user.tmpl"));
    }

    #[test]
    fn missing_directory_uses_builtins() {
        let set = PromptSet::load(Some(Path::new("/nonexistent/prompts"))).unwrap();
        assert!(set.vision_system.contains("FIGURE/TABLE REVIEWER"));
    }

    #[test]
    fn manuscript_is_bounded_with_marker() {
        let text = "é".repeat(50);
        let out = bound_manuscript(&text, 10);
        assert!(out.starts_with(&"é".repeat(10)));
        assert!(out.contains("10 of 50 characters"));
        assert_eq!(bound_manuscript("short", 10), "short");
    }
}
