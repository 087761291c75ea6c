use crate::captions::{derive_words, estimate_words, parse_srt, CaptionEntry, Word};
use std::ops::Range;

/// Slack on both edges of a word span, absorbing frame-time jitter
pub const MATCH_TOLERANCE: f64 = 0.1;
/// How long the final word stays highlighted after it ends
pub const HOLD_DURATION: f64 = 0.5;

/// Index of the word to highlight at `current_time`, if any.
///
/// `words` must be in timeline order (as [`derive_words`] and
/// [`estimate_words`] produce them). A word matches when `current_time` lies
/// in `[start - 0.1, end + 0.1)`; the earliest match wins. Once every word is
/// over, the last one stays highlighted until 0.5s after its end. Gaps between
/// words and the time before the first word have no highlight.
///
/// O(log n), so it is safe to call on every frame.
pub fn active_word_index(words: &[Word], current_time: f64) -> Option<usize> {
    if words.is_empty() || current_time.is_nan() {
        return None;
    }

    // first word not yet over (ends are non-decreasing)
    let i = words.partition_point(|w| w.end_time + MATCH_TOLERANCE <= current_time);
    if let Some(word) = words.get(i) {
        if word.start_time - MATCH_TOLERANCE <= current_time {
            return Some(i);
        }
    }

    let last = words.len() - 1;
    (i == words.len() && current_time < words[last].end_time + HOLD_DURATION).then_some(last)
}

/// Parsed caption entries plus their word timings, ready for per-frame use
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionTrack {
    entries: Vec<CaptionEntry>,
    words: Vec<Word>,
    entry_words: Vec<Range<usize>>,
    estimated: bool,
}

impl CaptionTrack {
    pub fn from_entries(entries: Vec<CaptionEntry>) -> Self {
        let words = derive_words(&entries);
        Self::assemble(entries, words, false)
    }

    pub fn from_srt(input: &str) -> Self {
        Self::from_entries(parse_srt(input))
    }

    /// Estimated timings for a scene without a caption file
    pub fn from_plain_text(text: &str, duration: f64) -> Self {
        let words = estimate_words(text, duration);
        if words.is_empty() {
            return Self::default();
        }
        let end = words.last().map_or(0.0, |w| w.end_time);
        let entry = CaptionEntry::new(0.0, end, text.trim());
        Self::assemble(vec![entry], words, true)
    }

    /// Use the caption file when it yields entries, else estimate from text.
    pub fn resolve(srt: Option<&str>, text: &str, duration: f64) -> Self {
        match srt.map(Self::from_srt) {
            Some(track) if !track.is_empty() => track,
            _ => Self::from_plain_text(text, duration),
        }
    }

    fn assemble(entries: Vec<CaptionEntry>, words: Vec<Word>, estimated: bool) -> Self {
        let mut entry_words = vec![0..0; entries.len()];
        let mut start = 0;
        while start < words.len() {
            let idx = words[start].entry_index;
            let len = words[start..]
                .iter()
                .take_while(|w| w.entry_index == idx)
                .count();
            if let Some(range) = entry_words.get_mut(idx) {
                *range = start..start + len;
            }
            start += len;
        }

        Self {
            entries,
            words,
            entry_words,
            estimated,
        }
    }

    pub fn entries(&self) -> &[CaptionEntry] {
        &self.entries
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    /// Whether timings came from the plain-text estimate
    pub fn is_estimated(&self) -> bool {
        self.estimated
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn active_word(&self, current_time: f64) -> Option<usize> {
        active_word_index(&self.words, current_time)
    }

    /// Entry whose `[start, end]` contains `current_time`
    pub fn active_entry(&self, current_time: f64) -> Option<usize> {
        if current_time.is_nan() {
            return None;
        }
        let i = self
            .entries
            .partition_point(|e| e.start_time <= current_time)
            .checked_sub(1)?;
        (current_time <= self.entries[i].end_time).then_some(i)
    }

    /// Index range into [`Self::words`] belonging to an entry
    pub fn entry_word_range(&self, entry_index: usize) -> Range<usize> {
        self.entry_words.get(entry_index).cloned().unwrap_or(0..0)
    }

    pub fn entry_words(&self, entry_index: usize) -> &[Word] {
        &self.words[self.entry_word_range(entry_index)]
    }
}
