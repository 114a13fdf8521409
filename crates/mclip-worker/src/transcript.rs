//! WebVTT cue transcripts: parsing, time windowing and chunking.

use std::sync::OnceLock;

use mclip_models::parse_timestamp;
use regex::Regex;
use tracing::warn;

/// One WebVTT cue.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Cue payload with markup removed, lines joined by spaces
    pub text: String,
}

fn timing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^((?:\d+:)?\d{2}:\d{2}\.\d{3})\s+-->\s+((?:\d+:)?\d{2}:\d{2}\.\d{3})")
            .expect("static cue timing pattern")
    })
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]+>").expect("static tag pattern"))
}

/// Parse VTT content into cues.
///
/// The `WEBVTT` header, cue identifiers and anything before the first timing
/// line are skipped. Inline tags (`<c>`, `<00:00:01.000>`) are stripped.
pub fn parse_vtt(content: &str) -> Vec<Cue> {
    let mut cues: Vec<Cue> = Vec::new();
    let mut current: Option<Cue> = None;

    for raw in content.lines() {
        let line = raw.trim();

        if line.is_empty() {
            if let Some(cue) = current.take() {
                cues.push(cue);
            }
            continue;
        }

        if let Some(caps) = timing_pattern().captures(line) {
            if let Some(cue) = current.take() {
                cues.push(cue);
            }
            match (parse_timestamp(&caps[1]), parse_timestamp(&caps[2])) {
                (Ok(start_seconds), Ok(end_seconds)) => {
                    current = Some(Cue {
                        start_seconds,
                        end_seconds,
                        text: String::new(),
                    });
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(line = %line, error = %e, "Skipping cue with invalid timing");
                }
            }
            continue;
        }

        let Some(cue) = current.as_mut() else {
            // Header, identifiers or notes outside a cue
            continue;
        };

        let text = tag_pattern().replace_all(line, "");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !cue.text.is_empty() {
            cue.text.push(' ');
        }
        cue.text.push_str(text);
    }

    if let Some(cue) = current.take() {
        cues.push(cue);
    }

    cues
}

/// Join the text of the cues inside a time window.
///
/// Recording starts at the first cue starting at or after `start` (at once
/// when `start` is `None`) and the scan stops at the first cue ending after
/// `end`.
pub fn window_transcript(cues: &[Cue], start: Option<f64>, end: Option<f64>) -> String {
    let mut recording = false;
    let mut parts: Vec<&str> = Vec::new();

    for cue in cues {
        if start.map_or(true, |s| cue.start_seconds >= s) {
            recording = true;
        }
        if end.is_some_and(|e| cue.end_seconds > e) {
            break;
        }
        if recording && !cue.text.is_empty() {
            parts.push(&cue.text);
        }
    }

    parts.join(" ")
}

/// Split text into chunks of at most `max_words` whitespace-separated words.
pub fn chunk_transcript(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(max_words.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}
