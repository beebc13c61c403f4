use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::ingest::TextUnit;

/// Default hard cap on spans per document.
pub const DEFAULT_MAX_SPANS: usize = 30_000;

/// Default character budget for one passage.
pub const DEFAULT_PASSAGE_CHARS: usize = 1800;

/// An addressable piece of document text handed to the retriever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub pointer: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStrategy {
    Sentences,
    Passages,
}

impl SegmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentences => "sentences",
            Self::Passages => "passages",
        }
    }
}

impl fmt::Display for SegmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sentences" => Ok(Self::Sentences),
            "passages" => Ok(Self::Passages),
            other => Err(format!("unknown segmenter '{other}' (expected sentences|passages)")),
        }
    }
}

/// Splits text units into spans.
pub trait Segmenter {
    fn segment(&self, units: &[TextUnit]) -> Vec<Span>;
}

/// Span accumulator that enforces the cap.
pub(crate) struct SpanSink {
    spans: Vec<Span>,
    cap: usize,
}

impl SpanSink {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            spans: Vec::new(),
            cap,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.spans.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.spans.len() >= self.cap
    }

    /// Push a span unless empty or over cap. Returns `false` once full.
    pub(crate) fn push(&mut self, pointer: String, text: &str) -> bool {
        if self.is_full() {
            return false;
        }
        let text = text.trim();
        if !text.is_empty() {
            self.spans.push(Span {
                pointer,
                text: text.to_string(),
            });
        }
        !self.is_full()
    }

    pub(crate) fn finish(self) -> Vec<Span> {
        self.spans
    }
}

/// Build the segmenter for a strategy.
pub fn segmenter_for(
    strategy: SegmentStrategy,
    max_spans: usize,
    passage_chars: usize,
) -> Box<dyn Segmenter + Send + Sync> {
    match strategy {
        SegmentStrategy::Sentences => Box::new(super::SentenceSegmenter::new(max_spans)),
        SegmentStrategy::Passages => {
            Box::new(super::PassageChunker::new(passage_chars, max_spans))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_stops_at_cap() {
        let mut sink = SpanSink::new(2);
        assert!(sink.push("a".into(), "one"));
        assert!(!sink.push("b".into(), "two"));
        assert!(!sink.push("c".into(), "three"));
        assert_eq!(sink.finish().len(), 2);
    }

    #[test]
    fn sink_skips_blank_text() {
        let mut sink = SpanSink::new(5);
        sink.push("a".into(), "   ");
        sink.push("b".into(), " kept ");
        let spans = sink.finish();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "kept");
    }

    #[test]
    fn strategy_parses() {
        assert_eq!("passages".parse::<SegmentStrategy>().unwrap(), SegmentStrategy::Passages);
        assert!("words".parse::<SegmentStrategy>().is_err());
    }
}
