use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Issue severity, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Fatal => "fatal",
        }
    }

    /// Upper-case tag used in prompt evidence blocks.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Minor => "MINOR",
            Self::Moderate => "MODERATE",
            Self::Major => "MAJOR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Case-insensitive; `critical` is accepted as the fatal-equivalent level.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" => Ok(Self::Minor),
            "moderate" => Ok(Self::Moderate),
            "major" => Ok(Self::Major),
            "fatal" | "critical" => Ok(Self::Fatal),
            other => Err(format!(
                "unknown severity '{other}' (expected minor|moderate|major|fatal)"
            )),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricItem {
    pub id: String,
    pub label: String,
    pub probes: Vec<String>,
    pub severity: Severity,
}

/// A named, read-only set of rubric items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    pub items: Vec<RubricItem>,
}

impl Rubric {
    pub fn get(&self, id: &str) -> Option<&RubricItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn probe_count(&self) -> usize {
        self.items.iter().map(|item| item.probes.len()).sum()
    }

    /// Bulleted item list for the critic prompt, most severe first,
    /// file order within a severity.
    pub fn guidance(&self) -> String {
        let mut items: Vec<&RubricItem> = self.items.iter().collect();
        items.sort_by(|a, b| b.severity.cmp(&a.severity));
        items
            .iter()
            .map(|item| format!("- [{}] {} ({})", item.severity.tag(), item.label, item.id))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, severity: Severity) -> RubricItem {
        RubricItem {
            id: id.into(),
            label: format!("{id} label"),
            probes: vec![format!("{id} probe")],
            severity,
        }
    }

    #[test]
    fn severity_parses_case_insensitively_with_alias() {
        assert_eq!("Major".parse::<Severity>().unwrap(), Severity::Major);
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Fatal);
        assert!("blocker".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_serde_roundtrip_uses_lowercase() {
        let json = serde_json::to_string(&Severity::Moderate).unwrap();
        assert_eq!(json, "\"moderate\"");
        let back: Severity = serde_json::from_str("\"Fatal\"").unwrap();
        assert_eq!(back, Severity::Fatal);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Fatal > Severity::Major);
        assert!(Severity::Moderate > Severity::Minor);
    }

    #[test]
    fn guidance_orders_by_severity_then_file_order() {
        let rubric = Rubric {
            name: "core".into(),
            items: vec![
                item("a", Severity::Minor),
                item("b", Severity::Fatal),
                item("c", Severity::Minor),
            ],
        };
        assert_eq!(
            rubric.guidance(),
            "- [FATAL] b label (b)\n- [MINOR] a label (a)\n- [MINOR] c label (c)"
        );
        assert_eq!(rubric.item_ids(), vec!["a", "b", "c"]);
        assert!(rubric.get("b").is_some());
        assert_eq!(rubric.probe_count(), 3);
    }
}
