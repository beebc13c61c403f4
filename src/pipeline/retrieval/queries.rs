use crate::pipeline::prompt::ManuscriptMetadata;

const BASE_QUERIES: &[&str] = &[
    "abstract main findings limitations",
    "methods inclusion exclusion design bias confounding",
    "statistics sample size power confidence intervals missing data",
    "results primary endpoint secondary endpoints calibration subgroup",
    "discussion limitations generalizability ethics reproducibility",
    "tables figures legends units",
    "references novelty prior work",
];

const AI_QUERIES: &[&str] = &[
    "ai model architecture training validation external validation leakage",
    "data split patient-level leakage preprocessing augmentation",
    "calibration decision threshold clinical utility",
];

const EDUCATION_QUERIES: &[&str] = &[
    "education design validity evidence assessment control group effect size",
    "kirkpatrick levels outcomes survey instrument reliability",
];

fn is_education(metadata: &ManuscriptMetadata) -> bool {
    let kind = metadata.manuscript_type.trim().to_lowercase();
    matches!(kind.as_str(), "education" | "medical_education")
        || metadata.study_design.trim().eq_ignore_ascii_case("educational_intervention")
}

/// Topic queries for global retrieval, in a fixed order.
///
/// AI manuscripts add model and leakage queries, education manuscripts add
/// study-design queries. `extra` is appended last; blanks and exact
/// duplicates are dropped.
pub fn build_topic_queries(metadata: &ManuscriptMetadata, extra: &[String]) -> Vec<String> {
    let mut queries: Vec<String> = BASE_QUERIES.iter().map(|q| q.to_string()).collect();
    if metadata.has_ai {
        queries.extend(AI_QUERIES.iter().map(|q| q.to_string()));
    }
    if is_education(metadata) {
        queries.extend(EDUCATION_QUERIES.iter().map(|q| q.to_string()));
    }
    for q in extra {
        let q = q.trim();
        if !q.is_empty() && !queries.iter().any(|existing| existing == q) {
            queries.push(q.to_string());
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(kind: &str, design: &str, has_ai: bool) -> ManuscriptMetadata {
        ManuscriptMetadata {
            manuscript_type: kind.into(),
            study_design: design.into(),
            has_ai,
            ..ManuscriptMetadata::default()
        }
    }

    #[test]
    fn base_queries_only() {
        let q = build_topic_queries(&meta("original_research", "diagnostic_accuracy", false), &[]);
        assert_eq!(q.len(), 7);
        assert_eq!(q[0], "abstract main findings limitations");
    }

    #[test]
    fn ai_adds_leakage_queries() {
        let q = build_topic_queries(&meta("original_research", "cohort", true), &[]);
        assert_eq!(q.len(), 10);
        assert!(q.iter().any(|s| s.contains("patient-level leakage")));
    }

    #[test]
    fn education_by_type_or_design() {
        assert_eq!(build_topic_queries(&meta("medical_education", "x", false), &[]).len(), 9);
        assert_eq!(
            build_topic_queries(&meta("original_research", "educational_intervention", false), &[])
                .len(),
            9
        );
    }

    #[test]
    fn extra_queries_appended_without_duplicates() {
        let extra = vec![
            "radiation dosimetry".to_string(),
            "  ".to_string(),
            "tables figures legends units".to_string(),
        ];
        let q = build_topic_queries(&meta("original_research", "cohort", false), &extra);
        assert_eq!(q.len(), 8);
        assert_eq!(q.last().map(String::as_str), Some("radiation dosimetry"));
    }
}
