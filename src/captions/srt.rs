use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// A timestamped span of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionEntry {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl CaptionEntry {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

fn timecode_regex() -> &'static Regex {
    static TIMECODE: OnceLock<Regex> = OnceLock::new();
    TIMECODE.get_or_init(|| {
        Regex::new(
            r"(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{2,}):(\d{2}):(\d{2})[,.](\d{3})",
        )
        .expect("valid timecode regex")
    })
}

fn seconds(h: &str, m: &str, s: &str, ms: &str) -> Option<f64> {
    let h: f64 = h.parse().ok()?;
    let m: f64 = m.parse().ok()?;
    let s: f64 = s.parse().ok()?;
    let ms: f64 = ms.parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s + ms / 1000.0)
}

/// Parse SubRip caption text into time-ordered, non-overlapping entries.
///
/// Never fails: malformed blocks are skipped and garbage input yields an empty
/// list. Multi-line cue text is joined with single spaces. Overlapping cues
/// are clipped to start where the previous one ends.
pub fn parse_srt(input: &str) -> Vec<CaptionEntry> {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    let mut block: Vec<&str> = Vec::new();
    let lines = normalized.lines().chain(std::iter::once(""));
    for line in lines {
        if line.trim().is_empty() {
            if !block.is_empty() {
                match parse_block(&block) {
                    Some(entry) => entries.push(entry),
                    None => skipped += 1,
                }
                block.clear();
            }
        } else {
            block.push(line);
        }
    }

    if skipped > 0 {
        debug!(skipped, parsed = entries.len(), "skipped malformed caption blocks");
    }

    sanitize(entries)
}

fn parse_block(lines: &[&str]) -> Option<CaptionEntry> {
    // the sequence number is optional; the timecode line anchors the block
    let timecode_at = lines.iter().position(|l| l.contains("-->"))?;
    let caps = timecode_regex().captures(lines[timecode_at])?;
    let start = seconds(&caps[1], &caps[2], &caps[3], &caps[4])?;
    let end = seconds(&caps[5], &caps[6], &caps[7], &caps[8])?;

    let text = lines[timecode_at + 1..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() || end < start {
        return None;
    }
    Some(CaptionEntry::new(start, end, text))
}

fn sanitize(mut entries: Vec<CaptionEntry>) -> Vec<CaptionEntry> {
    entries.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut out: Vec<CaptionEntry> = Vec::with_capacity(entries.len());
    for mut entry in entries {
        if let Some(prev) = out.last() {
            if entry.start_time < prev.end_time {
                entry.start_time = prev.end_time;
            }
        }
        if entry.end_time >= entry.start_time {
            out.push(entry);
        }
    }
    out
}

/// Format seconds as an SRT timecode (`HH:MM:SS,mmm`)
pub fn format_timecode(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}
