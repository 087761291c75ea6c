//! Word-level timing derived from caption entries or plain text.

use crate::captions::CaptionEntry;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Time given to each whitespace run
pub const WHITESPACE_DURATION: f64 = 0.05;
/// Speaking rate assumed when neither captions nor a duration are known
pub const WORDS_PER_SECOND: f64 = 3.0;
/// Extra weight per letter when estimating word length
const LENGTH_WEIGHT: f64 = 0.08;
/// Multiplier for words carrying sentence punctuation
const PUNCTUATION_WEIGHT: f64 = 1.3;

/// One token of a caption entry with its time span.
///
/// Whitespace runs are tokens too, so concatenating the words of an entry
/// reproduces its text exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub entry_index: usize,
}

impl Word {
    pub fn is_whitespace(&self) -> bool {
        is_whitespace_token(&self.text)
    }
}

fn is_whitespace_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_whitespace)
}

/// Split text into alternating word and whitespace runs, dropping nothing.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                tokens.push(&text[start..i]);
                start = i;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Spread each entry's span evenly across its words.
///
/// An entry's tokens are laid out from its own start time and fill exactly
/// `[start, end]`: whitespace runs get [`WHITESPACE_DURATION`] (less when the
/// entry is too short to fit it), and the rest is shared equally by the
/// non-whitespace tokens. Entries overlapping the previous one start where it
/// ended, so the result stays ordered in time.
pub fn derive_words(entries: &[CaptionEntry]) -> Vec<Word> {
    let mut words = Vec::new();
    let mut previous_end = f64::NEG_INFINITY;

    for (entry_index, entry) in entries.iter().enumerate() {
        let tokens = tokenize(&entry.text);
        let count = tokens.iter().filter(|t| !is_whitespace_token(t)).count();
        if count == 0 {
            continue;
        }
        let gaps = tokens.len() - count;

        let mut cursor = entry.start_time.max(previous_end);
        let available = (entry.end_time - cursor).max(0.0);
        let gap_span = WHITESPACE_DURATION.min(available / tokens.len() as f64);
        let per_word = (available - gap_span * gaps as f64) / count as f64;

        for token in tokens {
            let span = if is_whitespace_token(token) {
                gap_span
            } else {
                per_word
            };
            words.push(Word {
                text: token.to_string(),
                start_time: cursor,
                end_time: cursor + span,
                entry_index,
            });
            cursor += span;
        }
        previous_end = cursor;
    }
    words
}

fn word_weight(token: &str) -> f64 {
    let letters = token
        .graphemes(true)
        .filter(|g| g.chars().any(char::is_alphanumeric))
        .count();
    let weight = 1.0 + letters as f64 * LENGTH_WEIGHT;
    if token.contains(['.', ',', '!', '?', ';', ':']) {
        weight * PUNCTUATION_WEIGHT
    } else {
        weight
    }
}

/// Approximate word timings for text that has no caption track.
///
/// This is an estimate, not a transcription. The scene duration (or, when it
/// is not positive, `words / 3` seconds) is covered exactly: whitespace runs
/// take [`WHITESPACE_DURATION`] (less for very short scenes) and the words
/// share the rest in proportion to their weight, `1 + 0.08 * letters`, times
/// 1.3 when the word carries punctuation. All words belong to entry 0.
pub fn estimate_words(text: &str, duration: f64) -> Vec<Word> {
    let text = text.trim();
    let tokens = tokenize(text);
    let weights: Vec<f64> = tokens
        .iter()
        .filter(|t| !is_whitespace_token(t))
        .map(|t| word_weight(t))
        .collect();
    if weights.is_empty() {
        return Vec::new();
    }

    let total = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        weights.len() as f64 / WORDS_PER_SECOND
    };
    let gaps = tokens.len() - weights.len();
    let gap_span = WHITESPACE_DURATION.min(total / tokens.len() as f64);
    let spoken = total - gap_span * gaps as f64;
    let weight_sum: f64 = weights.iter().sum();

    let mut weights = weights.into_iter();
    let mut cursor = 0.0;
    let mut words: Vec<Word> = tokens
        .into_iter()
        .map(|token| {
            let span = if is_whitespace_token(token) {
                gap_span
            } else {
                spoken * weights.next().unwrap_or(0.0) / weight_sum
            };
            let word = Word {
                text: token.to_string(),
                start_time: cursor,
                end_time: cursor + span,
                entry_index: 0,
            };
            cursor += span;
            word
        })
        .collect();

    // absorb rounding so the last word ends on the scene boundary
    if let Some(last) = words.last_mut() {
        last.end_time = total.max(last.start_time);
    }
    words
}
