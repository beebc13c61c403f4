use super::types::{Evidence, EvidenceReport, EvidenceSet, EvidenceSource, Snippet};

/// Text inserted into prompts when no evidence could be gathered.
pub const NO_EVIDENCE: &str = "(no evidence snippets available)";

/// Render the evidence report as the plain-text block given to the models.
///
/// Positional fallback is announced on the first line so the models (and
/// anyone reading `evidence.md`) never mistake it for similarity ranking.
pub fn render_evidence_block(report: &EvidenceReport) -> String {
    let body = match &report.set {
        EvidenceSet::PerItem(items) => render_per_item(items),
        EvidenceSet::Global(snippets) => render_global(snippets),
    };
    let body = if body.trim().is_empty() {
        NO_EVIDENCE.to_string()
    } else {
        body
    };

    match &report.source {
        EvidenceSource::PositionalFallback { reason } => format!(
            "NOTE: positional fallback (embedding unavailable: {reason}); \
             scores are 0.00 sentinels, not similarity.\n\n{body}"
        ),
        EvidenceSource::Embedding { .. } => body,
    }
}

fn render_per_item(items: &[Evidence]) -> String {
    let mut out = String::new();
    for e in items {
        out.push_str(&format!(
            "- [{}] {} | score={:.2}\n",
            e.severity.tag(),
            e.label,
            e.score
        ));
        for s in &e.snippets {
            out.push_str(&format!("  \u{2022} {s}\n"));
        }
    }
    out.trim_end().to_string()
}

fn render_global(snippets: &[Snippet]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "[EVIDENCE {}] ({}, score={:.3})\n{}",
                i + 1,
                s.pointer,
                s.score,
                s.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
