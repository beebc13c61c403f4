use std::collections::BTreeMap;
use std::fmt;

use super::TemplateError;

/// Every placeholder a prompt template may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    ManuscriptContext,
    ReviewerTemplate,
    NomenclatureGuide,
    RubricGuidance,
    Evidence,
    Manuscript,
    CriticLog,
    FigureNotes,
    FigureSelection,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Self::ManuscriptContext,
        Self::ReviewerTemplate,
        Self::NomenclatureGuide,
        Self::RubricGuidance,
        Self::Evidence,
        Self::Manuscript,
        Self::CriticLog,
        Self::FigureNotes,
        Self::FigureSelection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManuscriptContext => "manuscript_context",
            Self::ReviewerTemplate => "reviewer_template",
            Self::NomenclatureGuide => "nomenclature_guide",
            Self::RubricGuidance => "rubric_guidance",
            Self::Evidence => "evidence",
            Self::Manuscript => "manuscript",
            Self::CriticLog => "critic_log",
            Self::FigureNotes => "figure_notes",
            Self::FigureSelection => "figure_selection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values for a render call.
#[derive(Debug, Clone, Default)]
pub struct SlotValues(BTreeMap<Slot, String>);

impl SlotValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: Slot, value: impl Into<String>) -> Self {
        self.0.insert(slot, value.into());
        self
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.0.get(&slot).map(String::as_str)
    }
}

/// A parsed `{{slot}}` template.
///
/// Only the slots in `allowed` may appear; anything else fails at parse
/// time. Whitespace inside the braces is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(name: &str, source: &str, allowed: &[Slot]) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| TemplateError::UnterminatedSlot {
                template: name.to_string(),
                offset: consumed + open,
            })?;

            let slot_name = after[..close].trim();
            let slot = Slot::from_name(slot_name)
                .filter(|s| allowed.contains(s))
                .ok_or_else(|| TemplateError::UnknownSlot {
                    template: name.to_string(),
                    slot: slot_name.to_string(),
                })?;
            segments.push(Segment::Slot(slot));

            let advance = open + 2 + close + 2;
            consumed += advance;
            rest = &rest[advance..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slots used by the template, deduplicated, in first-use order.
    pub fn slots(&self) -> Vec<Slot> {
        let mut out: Vec<Slot> = Vec::new();
        for seg in &self.segments {
            if let Segment::Slot(s) = seg {
                if !out.contains(s) {
                    out.push(*s);
                }
            }
        }
        out
    }

    /// Substitute every slot. Values are inserted verbatim, never re-scanned.
    pub fn render(&self, values: &SlotValues) -> Result<String, TemplateError> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    let value = values.get(*slot).ok_or_else(|| TemplateError::MissingSlot {
                        template: self.name.clone(),
                        slot: slot.as_str().to_string(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
