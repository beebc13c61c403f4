use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::pipeline::ingest::{single_line, truncate_chars};
use crate::pipeline::rubric::{Rubric, RubricItem};
use crate::pipeline::segment::Span;

use super::similarity::{clamp_score, cosine_similarity, l2_normalize};
use super::types::{
    EmbeddingModel, Evidence, EvidenceReport, EvidenceSet, EvidenceSource, RetrievalConfig,
    Snippet,
};
use super::EmbeddingError;

/// Ranks document spans against rubric probes or topic queries.
pub struct EvidenceRetriever<'a> {
    embedder: &'a dyn EmbeddingModel,
    config: &'a RetrievalConfig,
}

impl<'a> EvidenceRetriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingModel, config: &'a RetrievalConfig) -> Self {
        Self { embedder, config }
    }

    /// One Evidence record per rubric item, in rubric order.
    ///
    /// Never fails: an embedding error switches to positional evidence.
    pub fn for_rubric(&self, rubric: &Rubric, spans: &[Span]) -> EvidenceReport {
        match self.rank_rubric(rubric, spans) {
            Ok(items) => {
                let report = EvidenceReport {
                    source: EvidenceSource::Embedding {
                        backend: self.embedder.name(),
                    },
                    set: EvidenceSet::PerItem(items),
                };
                log_report(&report, spans.len());
                report
            }
            Err(e) => {
                warn!(error = %e, "Embedding failed, using positional evidence");
                let snippets = self.positional(spans);
                let items = rubric
                    .items
                    .iter()
                    .map(|item| evidence_for(item, snippets.clone()))
                    .collect();
                EvidenceReport {
                    source: EvidenceSource::PositionalFallback {
                        reason: e.to_string(),
                    },
                    set: EvidenceSet::PerItem(items),
                }
            }
        }
    }

    /// One global ranked list across all topic queries.
    pub fn for_topics(&self, queries: &[String], spans: &[Span]) -> EvidenceReport {
        match self.rank_topics(queries, spans) {
            Ok(snippets) => {
                let report = EvidenceReport {
                    source: EvidenceSource::Embedding {
                        backend: self.embedder.name(),
                    },
                    set: EvidenceSet::Global(snippets),
                };
                log_report(&report, spans.len());
                report
            }
            Err(e) => {
                warn!(error = %e, "Embedding failed, using positional evidence");
                EvidenceReport {
                    source: EvidenceSource::PositionalFallback {
                        reason: e.to_string(),
                    },
                    set: EvidenceSet::Global(self.positional_passages(spans)),
                }
            }
        }
    }

    fn rank_rubric(&self, rubric: &Rubric, spans: &[Span]) -> Result<Vec<Evidence>, EmbeddingError> {
        if spans.is_empty() {
            return Ok(rubric
                .items
                .iter()
                .map(|item| evidence_for(item, Vec::new()))
                .collect());
        }

        let span_vecs = self.embed(&span_texts(spans))?;
        let mut items = Vec::with_capacity(rubric.items.len());
        for item in &rubric.items {
            let probes: Vec<&str> = item.probes.iter().map(String::as_str).collect();
            let probe_vecs = self.embed(&probes)?;
            check_dimensions(&probe_vecs, &span_vecs)?;

            let scores = max_scores(&probe_vecs, &span_vecs);
            let snippets = top_k(&scores, self.config.top_k)
                .into_iter()
                .map(|i| self.snippet(&spans[i], scores[i]))
                .collect();

            let evidence = evidence_for(item, snippets);
            debug!(item = %item.id, score = evidence.score, "Evidence ranked");
            items.push(evidence);
        }
        Ok(items)
    }

    fn rank_topics(&self, queries: &[String], spans: &[Span]) -> Result<Vec<Snippet>, EmbeddingError> {
        if spans.is_empty() || queries.is_empty() {
            return Ok(Vec::new());
        }

        let query_refs: Vec<&str> = queries.iter().map(String::as_str).collect();
        let query_vecs = self.embed(&query_refs)?;
        let span_vecs = self.embed(&span_texts(spans))?;
        check_dimensions(&query_vecs, &span_vecs)?;

        let scores = max_scores(&query_vecs, &span_vecs);
        Ok(top_k(&scores, self.config.top_k)
            .into_iter()
            .map(|i| self.passage_snippet(&spans[i], scores[i]))
            .collect())
    }

    /// Embed and L2-normalise, checking one vector per input.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = self.embedder.embed_batch(texts)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::Backend(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        for v in &mut vectors {
            l2_normalize(v);
        }
        Ok(vectors)
    }

    fn snippet(&self, span: &Span, score: f32) -> Snippet {
        Snippet {
            pointer: span.pointer.clone(),
            text: single_line(truncate_chars(&span.text, self.config.snippet_chars)),
            score,
        }
    }

    fn positional(&self, spans: &[Span]) -> Vec<Snippet> {
        spans
            .iter()
            .take(self.config.top_k)
            .map(|s| self.snippet(s, 0.0))
            .collect()
    }

    fn positional_passages(&self, spans: &[Span]) -> Vec<Snippet> {
        spans
            .iter()
            .take(self.config.top_k)
            .map(|s| self.passage_snippet(s, 0.0))
            .collect()
    }

    /// Topic snippets keep whole passages up to the passage budget, and
    /// never exceed `snippet_chars` when that is larger.
    fn passage_snippet(&self, span: &Span, score: f32) -> Snippet {
        let limit = self.config.snippet_chars.max(self.config.passage_chars);
        Snippet {
            pointer: span.pointer.clone(),
            text: truncate_chars(span.text.trim(), limit).trim_end().to_string(),
            score,
        }
    }
}

fn span_texts(spans: &[Span]) -> Vec<&str> {
    spans.iter().map(|s| s.text.as_str()).collect()
}

fn evidence_for(item: &RubricItem, snippets: Vec<Snippet>) -> Evidence {
    Evidence {
        item_id: item.id.clone(),
        label: item.label.clone(),
        severity: item.severity,
        score: snippets.first().map(|s| s.score).unwrap_or(0.0),
        snippets,
    }
}

fn check_dimensions(queries: &[Vec<f32>], spans: &[Vec<f32>]) -> Result<(), EmbeddingError> {
    let Some(expected) = spans.first().map(Vec::len) else {
        return Ok(());
    };
    if let Some(bad) = queries.iter().chain(spans).find(|v| v.len() != expected) {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            got: bad.len(),
        });
    }
    Ok(())
}

/// Per-span maximum similarity over all queries, clamped to [0, 1].
pub fn max_scores(queries: &[Vec<f32>], spans: &[Vec<f32>]) -> Vec<f32> {
    spans
        .iter()
        .map(|span| {
            let best = queries
                .iter()
                .map(|q| cosine_similarity(q, span))
                .fold(f32::NEG_INFINITY, f32::max);
            clamp_score(best)
        })
        .collect()
}

/// Indices of the `k` highest scores, descending; ties keep index order.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order.truncate(k);
    order
}

fn log_report(report: &EvidenceReport, span_count: usize) {
    info!(
        source = ?report.source,
        spans = span_count,
        snippets = report.snippet_count(),
        "Evidence retrieved"
    );
}
