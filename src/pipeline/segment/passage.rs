use crate::pipeline::ingest::{truncate_chars, TextUnit};

use super::types::{Segmenter, Span, SpanSink, DEFAULT_MAX_SPANS, DEFAULT_PASSAGE_CHARS};

/// Paragraph-accumulating chunker.
///
/// Consecutive units are joined (blank line between) until adding the next
/// one would exceed `max_chars` characters. A unit that alone exceeds the budget is cut
/// into pieces. Pointer: the first contributing unit's pointer plus `cN`,
/// with N the 1-based chunk ordinal across the document.
pub struct PassageChunker {
    max_chars: usize,
    max_spans: usize,
}

impl PassageChunker {
    pub fn new(max_chars: usize, max_spans: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            max_spans,
        }
    }
}

impl Default for PassageChunker {
    fn default() -> Self {
        Self::new(DEFAULT_PASSAGE_CHARS, DEFAULT_MAX_SPANS)
    }
}

struct Pending<'a> {
    pointer: Option<&'a str>,
    parts: Vec<&'a str>,
    /// Characters, separators included.
    chars: usize,
}

impl<'a> Pending<'a> {
    fn new() -> Self {
        Self {
            pointer: None,
            parts: Vec::new(),
            chars: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn add(&mut self, pointer: &'a str, text: &'a str, chars: usize) {
        if self.pointer.is_none() {
            self.pointer = Some(pointer);
        }
        self.chars += chars + 2;
        self.parts.push(text);
    }

    /// Emit the buffered passage. Returns `false` once the sink is full.
    fn flush(&mut self, sink: &mut SpanSink) -> bool {
        let Some(pointer) = self.pointer.take() else {
            return !sink.is_full();
        };
        let text = self.parts.join("\n\n");
        self.parts.clear();
        self.chars = 0;
        sink.push(format!("{pointer}c{}", sink.len() + 1), &text)
    }
}

impl Segmenter for PassageChunker {
    fn segment(&self, units: &[TextUnit]) -> Vec<Span> {
        let mut sink = SpanSink::new(self.max_spans);
        let mut pending = Pending::new();

        'units: for unit in units {
            let text = unit.text.trim();
            if text.is_empty() {
                continue;
            }

            let chars = text.chars().count();
            if chars > self.max_chars {
                if !pending.flush(&mut sink) {
                    break;
                }
                for piece in split_long_text(text, self.max_chars) {
                    let pointer = format!("{}c{}", unit.pointer, sink.len() + 1);
                    if !sink.push(pointer, piece) {
                        break 'units;
                    }
                }
                continue;
            }

            if !pending.is_empty() && pending.chars + chars + 2 > self.max_chars {
                if !pending.flush(&mut sink) {
                    break;
                }
            }
            pending.add(&unit.pointer, text, chars);
        }
        if !sink.is_full() {
            pending.flush(&mut sink);
        }

        if sink.is_full() {
            tracing::warn!(cap = self.max_spans, "Passage cap reached, remaining text ignored");
        }
        tracing::debug!(spans = sink.len(), "Passage chunking done");
        sink.finish()
    }
}

/// Cut an over-budget text into pieces of at most `max_chars` characters.
///
/// Prefers a sentence boundary (". ") inside the final fifth of each window,
/// otherwise cuts at exactly `max_chars` characters.
pub fn split_long_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let window_end = truncate_chars(rest, max_chars).len();
        if window_end == rest.len() {
            pieces.push(rest);
            break;
        }

        let search_from = truncate_chars(rest, max_chars - max_chars / 5).len();
        let cut = rest[search_from..window_end]
            .rfind(". ")
            .map(|pos| search_from + pos + 1)
            .unwrap_or(window_end);

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        rest = rest[cut..].trim_start();
    }
    pieces
}
