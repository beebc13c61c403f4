use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::types::{Rubric, RubricItem, Severity};
use super::RubricError;

/// On-disk rubric layout. `name` defaults to the file stem.
#[derive(Deserialize)]
struct RubricFile {
    #[serde(default)]
    name: Option<String>,
    items: Vec<RubricItemFile>,
}

#[derive(Deserialize)]
struct RubricItemFile {
    id: String,
    label: String,
    probes: Vec<String>,
    severity: Severity,
}

/// Load and validate one rubric file.
pub fn load_rubric(path: &Path) -> Result<Rubric, RubricError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RubricError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rubric(&raw, path)
}

/// Parse rubric JSON. `origin` is used for error messages and default name.
pub fn parse_rubric(raw: &str, origin: &Path) -> Result<Rubric, RubricError> {
    let file: RubricFile = serde_json::from_str(raw).map_err(|e| RubricError::Malformed {
        path: origin.to_path_buf(),
        reason: e.to_string(),
    })?;

    if file.items.is_empty() {
        return Err(RubricError::EmptyRubric(origin.to_path_buf()));
    }

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(file.items.len());
    for raw_item in file.items {
        let item = validate_item(raw_item, origin)?;
        if !seen.insert(item.id.clone()) {
            return Err(RubricError::DuplicateId {
                id: item.id,
                path: origin.to_path_buf(),
            });
        }
        items.push(item);
    }

    let name = file
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            origin
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "rubric".to_string())
        });

    Ok(Rubric { name, items })
}

fn validate_item(raw: RubricItemFile, origin: &Path) -> Result<RubricItem, RubricError> {
    let id = raw.id.trim().to_string();
    let invalid = |reason: &str| RubricError::InvalidItem {
        id: id.clone(),
        path: origin.to_path_buf(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("empty id"));
    }
    let label = raw.label.trim().to_string();
    if label.is_empty() {
        return Err(invalid("empty label"));
    }
    let probes: Vec<String> = raw
        .probes
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if probes.is_empty() {
        return Err(invalid("no non-empty probes"));
    }

    Ok(RubricItem {
        id,
        label,
        probes,
        severity: raw.severity,
    })
}

/// Merge already-loaded rubrics in order. Names are joined with `+`.
pub fn merge_rubrics(rubrics: Vec<(PathBuf, Rubric)>) -> Result<Rubric, RubricError> {
    if rubrics.is_empty() {
        return Err(RubricError::NoRubric);
    }

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    let mut items = Vec::new();
    for (path, rubric) in rubrics {
        names.push(rubric.name);
        for item in rubric.items {
            if !seen.insert(item.id.clone()) {
                return Err(RubricError::DuplicateId { id: item.id, path });
            }
            items.push(item);
        }
    }

    Ok(Rubric {
        name: names.join("+"),
        items,
    })
}

/// Load every file and merge them. Fails on the first bad file.
pub fn load_rubrics(paths: &[PathBuf]) -> Result<Rubric, RubricError> {
    let loaded = paths
        .iter()
        .map(|p| load_rubric(p).map(|r| (p.clone(), r)))
        .collect::<Result<Vec<_>, _>>()?;
    let rubric = merge_rubrics(loaded)?;

    info!(
        name = %rubric.name,
        files = paths.len(),
        items = rubric.items.len(),
        probes = rubric.probe_count(),
        "Rubric loaded"
    );
    Ok(rubric)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = r#"{
        "name": "core",
        "items": [
            {"id": "design", "label": "Study design", "probes": ["prospective design", "randomization"], "severity": "major"},
            {"id": "stats", "label": "Statistics", "probes": ["sample size"], "severity": "Moderate"}
        ]
    }"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_valid_rubric() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "core.json", CORE);
        let rubric = load_rubric(&path).unwrap();
        assert_eq!(rubric.name, "core");
        assert_eq!(rubric.items.len(), 2);
        assert_eq!(rubric.items[1].severity, Severity::Moderate);
        assert_eq!(rubric.items[0].probes, vec!["prospective design", "randomization"]);
    }

    #[test]
    fn missing_name_defaults_to_file_stem() {
        let raw = r#"{"items": [{"id": "x", "label": "X", "probes": ["p"], "severity": "minor"}]}"#;
        let rubric = parse_rubric(raw, Path::new("/r/ai_extension.json")).unwrap();
        assert_eq!(rubric.name, "ai_extension");
    }

    #[test]
    fn malformed_json_is_descriptive() {
        let err = parse_rubric("{\"items\": [", Path::new("bad.json")).unwrap_err();
        match err {
            RubricError::Malformed { path, reason } => {
                assert_eq!(path, PathBuf::from("bad.json"));
                assert!(reason.contains("line"), "reason: {reason}");
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_severity_is_malformed() {
        let raw = r#"{"items": [{"id": "x", "label": "X", "probes": ["p"], "severity": "blocker"}]}"#;
        assert!(matches!(
            parse_rubric(raw, Path::new("r.json")),
            Err(RubricError::Malformed { .. })
        ));
    }

    #[test]
    fn empty_items_rejected() {
        let err = parse_rubric(r#"{"name": "n", "items": []}"#, Path::new("r.json")).unwrap_err();
        assert!(matches!(err, RubricError::EmptyRubric(_)));
    }

    #[test]
    fn blank_probes_rejected() {
        let raw = r#"{"items": [{"id": "x", "label": "X", "probes": ["  "], "severity": "minor"}]}"#;
        let err = parse_rubric(raw, Path::new("r.json")).unwrap_err();
        assert!(matches!(err, RubricError::InvalidItem { ref id, .. } if id == "x"));
    }

    #[test]
    fn duplicate_id_within_file_rejected() {
        let raw = r#"{"items": [
            {"id": "x", "label": "X", "probes": ["p"], "severity": "minor"},
            {"id": "x", "label": "Y", "probes": ["q"], "severity": "major"}
        ]}"#;
        let err = parse_rubric(raw, Path::new("r.json")).unwrap_err();
        assert!(matches!(err, RubricError::DuplicateId { ref id, .. } if id == "x"));
    }

    #[test]
    fn merges_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "core.json", CORE);
        let b = write(
            dir.path(),
            "ai.json",
            r#"{"name": "ai", "items": [{"id": "leakage", "label": "Leakage", "probes": ["patient-level split"], "severity": "fatal"}]}"#,
        );
        let rubric = load_rubrics(&[a, b]).unwrap();
        assert_eq!(rubric.name, "core+ai");
        assert_eq!(rubric.item_ids(), vec!["design", "stats", "leakage"]);
    }

    #[test]
    fn duplicate_id_across_files_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.json", CORE);
        let b = write(dir.path(), "b.json", CORE);
        let err = load_rubrics(&[a, b.clone()]).unwrap_err();
        match err {
            RubricError::DuplicateId { id, path } => {
                assert_eq!(id, "design");
                assert_eq!(path, b);
            }
            other => panic!("expected DuplicateId, got {other:?}"),
        }
    }

    #[test]
    fn no_files_is_error() {
        assert!(matches!(load_rubrics(&[]), Err(RubricError::NoRubric)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_rubric(Path::new("/nonexistent/rubric.json")).unwrap_err();
        assert!(matches!(err, RubricError::Io { .. }));
    }
}
