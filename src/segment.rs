//! Segmentation of a token stream into display units.
//!
//! The extractor is deterministic and side-effect-free: the playback loop and
//! the narration loop both call it against the same document, so identical
//! inputs must always yield identical output.

use serde::{Deserialize, Serialize};

/// Upper bound on tokens folded into a single paragraph chunk.
pub const PARAGRAPH_TOKEN_CAP: usize = 50;

/// Marker a token ends with when the tokenizer preserves paragraph breaks.
/// Whitespace splitting strips newlines, so with the default loader the cap
/// is the effective paragraph boundary.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Policy selecting how tokens are grouped into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentMode {
    Word,
    Sentence,
    Paragraph,
}

impl Default for SegmentMode {
    fn default() -> Self {
        SegmentMode::Word
    }
}

impl std::fmt::Display for SegmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SegmentMode::Word => "word",
            SegmentMode::Sentence => "sentence",
            SegmentMode::Paragraph => "paragraph",
        };
        write!(f, "{}", label)
    }
}

/// One displayable/narratable unit: a contiguous token slice joined by
/// single spaces. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn token_count(&self) -> usize {
        self.end - self.start
    }
}

/// Extract the next segment starting at `cursor`.
///
/// Returns `None` when the cursor is at or past the end of the token
/// sequence; callers must treat that as loop termination rather than an
/// empty segment.
pub fn next_segment(
    tokens: &[String],
    cursor: usize,
    mode: SegmentMode,
) -> Option<(Segment, usize)> {
    if cursor >= tokens.len() {
        return None;
    }

    let end = match mode {
        SegmentMode::Word => cursor + 1,
        SegmentMode::Sentence => {
            let mut idx = cursor;
            loop {
                let token = &tokens[idx];
                idx += 1;
                if ends_sentence(token) || idx == tokens.len() {
                    break idx;
                }
            }
        }
        SegmentMode::Paragraph => {
            let mut idx = cursor;
            loop {
                let token = &tokens[idx];
                idx += 1;
                if token.ends_with(PARAGRAPH_BREAK)
                    || idx - cursor == PARAGRAPH_TOKEN_CAP
                    || idx == tokens.len()
                {
                    break idx;
                }
            }
        }
    };

    let segment = Segment {
        text: tokens[cursor..end].join(" "),
        start: cursor,
        end,
    };
    Some((segment, end))
}

fn ends_sentence(token: &str) -> bool {
    token.ends_with(|ch: char| matches!(ch, '.' | '!' | '?'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn word_mode_advances_by_one() {
        let doc = tokens(&["one", "two", "three"]);
        let (segment, next) = next_segment(&doc, 1, SegmentMode::Word)
            .expect("segment should be available");
        assert_eq!(segment.text, "two");
        assert_eq!((segment.start, segment.end), (1, 2));
        assert_eq!(next, 2);
    }

    #[test]
    fn sentence_mode_stops_at_terminal_punctuation() {
        let doc = tokens(&["Hello", "world.", "Next", "sentence!"]);
        let (first, next) = next_segment(&doc, 0, SegmentMode::Sentence)
            .expect("first sentence");
        assert_eq!(first.text, "Hello world.");
        assert_eq!(next, 2);
        let (second, next) = next_segment(&doc, next, SegmentMode::Sentence)
            .expect("second sentence");
        assert_eq!(second.text, "Next sentence!");
        assert_eq!(next, 4);
    }

    #[test]
    fn sentence_mode_consumes_trailing_unterminated_text() {
        let doc = tokens(&["no", "punctuation", "here"]);
        let (segment, next) = next_segment(&doc, 0, SegmentMode::Sentence)
            .expect("unterminated tail");
        assert_eq!(segment.text, "no punctuation here");
        assert_eq!(next, 3);
    }

    #[test]
    fn paragraph_mode_caps_at_fifty_tokens() {
        let doc: Vec<String> = (0..60).map(|i| format!("w{i}")).collect();
        let (segment, next) = next_segment(&doc, 0, SegmentMode::Paragraph)
            .expect("capped paragraph");
        assert_eq!(segment.token_count(), PARAGRAPH_TOKEN_CAP);
        assert_eq!(next, 50);
    }

    #[test]
    fn paragraph_mode_honors_break_marker() {
        let doc = tokens(&["alpha", "beta\n\n", "gamma"]);
        let (segment, next) = next_segment(&doc, 0, SegmentMode::Paragraph)
            .expect("marked paragraph");
        assert_eq!(next, 2);
        assert_eq!(segment.token_count(), 2);
    }

    #[test]
    fn exhausted_cursor_yields_none() {
        let doc = tokens(&["only"]);
        assert!(next_segment(&doc, 1, SegmentMode::Word).is_none());
        assert!(next_segment(&doc, 5, SegmentMode::Sentence).is_none());
        assert!(next_segment(&[], 0, SegmentMode::Paragraph).is_none());
    }

    #[test]
    fn every_mode_consumes_each_token_exactly_once() {
        let doc = tokens(&[
            "One", "two.", "Three", "four", "five!", "Six?", "seven", "eight",
        ]);
        for mode in [
            SegmentMode::Word,
            SegmentMode::Sentence,
            SegmentMode::Paragraph,
        ] {
            let mut cursor = 0;
            let mut consumed = 0;
            while let Some((segment, next)) = next_segment(&doc, cursor, mode) {
                assert_eq!(segment.start, cursor);
                assert!(next > cursor, "cursor must strictly increase");
                consumed += segment.token_count();
                cursor = next;
            }
            assert_eq!(consumed, doc.len(), "mode {mode} lost or reread tokens");
        }
    }
}
