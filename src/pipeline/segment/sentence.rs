use crate::pipeline::ingest::TextUnit;

use super::types::{Segmenter, Span, SpanSink, DEFAULT_MAX_SPANS};

/// Abbreviations that end in a period but do not end a sentence in
/// scientific prose. Compared case-insensitively.
const ABBREVIATIONS: &[&str] = &[
    "et al.", "e.g.", "i.e.", "etc.", "vs.", "cf.", "ca.", "approx.", "resp.",
    "Fig.", "Figs.", "Eq.", "Eqs.", "Ref.", "Refs.", "Tab.", "Suppl.", "Sect.",
    "No.", "Vol.", "pp.", "Dr.", "Mr.", "Mrs.", "Ms.", "Prof.", "Jr.",
    "Sr.", "St.", "Dept.", "Inc.", "Ltd.", "Co.", "min.", "max.", "avg.", "est.",
];

/// Characters that may close a sentence after its terminal punctuation.
fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Characters that may open a new sentence.
fn starts_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '(' | '[' | '\u{201C}')
}

/// Check if `prefix` (text up to and including a period) ends with a known
/// abbreviation or a single-letter initial ("J. Smith").
fn ends_with_abbreviation(prefix: &str) -> bool {
    let preceded_by_word_break = |abbr_len: usize| {
        prefix[..prefix.len() - abbr_len]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    };

    for abbr in ABBREVIATIONS {
        if prefix.len() >= abbr.len() && prefix.is_char_boundary(prefix.len() - abbr.len()) {
            let candidate = &prefix[prefix.len() - abbr.len()..];
            if candidate.eq_ignore_ascii_case(abbr) && preceded_by_word_break(abbr.len()) {
                return true;
            }
        }
    }

    // Single uppercase initial
    let mut tail = prefix.chars().rev();
    if let (Some('.'), Some(letter)) = (tail.next(), tail.next()) {
        if letter.is_uppercase() && tail.next().map_or(true, |c| !c.is_alphanumeric()) {
            return true;
        }
    }
    false
}

/// Split text into sentences. Boundaries are `.`, `!` or `?` (plus any
/// closing quotes or brackets) followed by whitespace and a sentence opener.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = iter.peek() {
            if is_closer(next) {
                end = j + next.len_utf8();
                iter.next();
            } else {
                break;
            }
        }

        if c == '.' && ends_with_abbreviation(&text[start..i + 1]) {
            continue;
        }

        let rest = &text[end..];
        let trimmed = rest.trim_start();
        if trimmed.len() == rest.len() {
            continue;
        }
        if trimmed.chars().next().is_some_and(starts_sentence) {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end + (rest.len() - trimmed.len());
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Sentence-level segmenter. Pointer is the unit pointer plus `sN`.
pub struct SentenceSegmenter {
    max_spans: usize,
}

impl SentenceSegmenter {
    pub fn new(max_spans: usize) -> Self {
        Self { max_spans }
    }
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPANS)
    }
}

impl Segmenter for SentenceSegmenter {
    fn segment(&self, units: &[TextUnit]) -> Vec<Span> {
        let mut sink = SpanSink::new(self.max_spans);
        'units: for unit in units {
            if unit.is_empty() {
                continue;
            }
            for (j, sentence) in split_sentences(&unit.text).into_iter().enumerate() {
                if !sink.push(format!("{}s{}", unit.pointer, j + 1), sentence) {
                    break 'units;
                }
            }
        }
        if sink.is_full() {
            tracing::warn!(cap = self.max_spans, "Sentence cap reached, remaining text ignored");
        }
        tracing::debug!(spans = sink.len(), "Sentence segmentation done");
        sink.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_sentences() {
        let s = split_sentences("We enrolled 40 patients. All completed follow-up! Was it enough?");
        assert_eq!(
            s,
            vec!["We enrolled 40 patients.", "All completed follow-up!", "Was it enough?"]
        );
    }

    #[test]
    fn keeps_scientific_abbreviations_together() {
        let s = split_sentences(
            "As shown by Smith et al. The cohort grew. See Fig. 2 for details. Done.",
        );
        assert_eq!(
            s,
            vec![
                "As shown by Smith et al. The cohort grew.",
                "See Fig. 2 for details.",
                "Done."
            ]
        );
    }

    #[test]
    fn eg_and_ie_do_not_split() {
        let s = split_sentences("Tracers, e.g. FDG, were used. Next sentence.");
        assert_eq!(s, vec!["Tracers, e.g. FDG, were used.", "Next sentence."]);
    }

    #[test]
    fn initials_do_not_split() {
        let s = split_sentences("Reviewed by J. Smith in 2020. Then accepted.");
        assert_eq!(s, vec!["Reviewed by J. Smith in 2020.", "Then accepted."]);
    }

    #[test]
    fn abbreviation_needs_word_break() {
        // "piano." ends with "no." but is not the abbreviation
        let s = split_sentences("He played the piano. Then left.");
        assert_eq!(s, vec!["He played the piano.", "Then left."]);
    }

    #[test]
    fn decimals_do_not_split() {
        let s = split_sentences("The AUC was 0.91 in total. Sensitivity was 88%.");
        assert_eq!(s, vec!["The AUC was 0.91 in total.", "Sensitivity was 88%."]);
    }

    #[test]
    fn closing_quote_stays_with_sentence() {
        let s = split_sentences("He said \"stop.\" Then we stopped.");
        assert_eq!(s, vec!["He said \"stop.\"", "Then we stopped."]);
    }

    #[test]
    fn lowercase_continuation_does_not_split() {
        let s = split_sentences("Values were high. and yet stable.");
        assert_eq!(s, vec!["Values were high. and yet stable."]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn segmenter_assigns_pointer_suffixes() {
        let units = vec![
            TextUnit::page(0, "Alpha one. Alpha two.".into()),
            TextUnit::page(1, String::new()),
            TextUnit::page(2, "Gamma.".into()),
        ];
        let spans = SentenceSegmenter::default().segment(&units);
        let pointers: Vec<&str> = spans.iter().map(|s| s.pointer.as_str()).collect();
        assert_eq!(pointers, vec!["[p1]s1", "[p1]s2", "[p3]s1"]);
        assert_eq!(spans[1].text, "Alpha two.");
    }

    #[test]
    fn capped_run_is_prefix_of_uncapped_run() {
        let units: Vec<TextUnit> = (0..5)
            .map(|i| TextUnit::page(i, format!("First {i}. Second {i}. Third {i}.")))
            .collect();
        let full = SentenceSegmenter::new(1000).segment(&units);
        let capped = SentenceSegmenter::new(7).segment(&units);
        assert_eq!(full.len(), 15);
        assert_eq!(capped.len(), 7);
        assert_eq!(&full[..7], &capped[..]);
    }
}
