use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MANUSCRIPT_TYPE: &str = "original_research";
pub const DEFAULT_STUDY_DESIGN: &str = "diagnostic_accuracy";

/// What the manuscript is, as told to the models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManuscriptMetadata {
    pub manuscript_type: String,
    pub study_design: String,
    pub has_ai: bool,
    /// Free-form fields (`--meta key=value`), rendered as extra lines.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Default for ManuscriptMetadata {
    fn default() -> Self {
        Self {
            manuscript_type: DEFAULT_MANUSCRIPT_TYPE.to_string(),
            study_design: DEFAULT_STUDY_DESIGN.to_string(),
            has_ai: false,
            extra: BTreeMap::new(),
        }
    }
}

impl ManuscriptMetadata {
    /// `- key: value` lines; known fields first, then every extra field.
    pub fn context_lines(&self) -> String {
        let mut lines = vec![
            format!("- type: {}", self.manuscript_type),
            format!("- study_design: {}", self.study_design),
            format!("- ai_related: {}", self.has_ai),
        ];
        for (key, value) in &self.extra {
            lines.push(format!("- {key}: {value}"));
        }
        lines.join("\n")
    }
}

/// Parse a `key=value` metadata argument.
pub fn parse_meta_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_known_then_extra_fields() {
        let mut meta = ManuscriptMetadata {
            has_ai: true,
            ..ManuscriptMetadata::default()
        };
        meta.extra.insert("journal".into(), "JNM".into());
        meta.extra.insert("tracer".into(), "[18F]FDG".into());
        assert_eq!(
            meta.context_lines(),
            "- type: original_research\n- study_design: diagnostic_accuracy\n- ai_related: true\n- journal: JNM\n- tracer: [18F]FDG"
        );
    }

    #[test]
    fn meta_field_parsing() {
        assert_eq!(
            parse_meta_field("journal = JNM").unwrap(),
            ("journal".to_string(), "JNM".to_string())
        );
        assert_eq!(parse_meta_field("note=a=b").unwrap().1, "a=b");
        assert!(parse_meta_field("novalue").is_err());
        assert!(parse_meta_field("=x").is_err());
    }
}
