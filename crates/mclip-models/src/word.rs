//! Word-level timing records and their line-oriented file format.
//!
//! Timings are persisted as JSON Lines. The first non-blank line is a header
//! naming the format and version; every following line is one word:
//!
//! ```text
//! {"format":"mclip-word-timings","version":1}
//! {"text":"hi","offset":0,"duration":5000000}
//! {"text":"there","offset":5000000,"duration":5000000}
//! ```
//!
//! The parser fails closed: an unknown version, an unknown field, an empty
//! word, an offset that goes backwards or a word ending past the tick range
//! rejects the whole file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of 100-nanosecond ticks in one second.
pub const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Format name carried in the header line.
pub const WORD_TIMINGS_FORMAT: &str = "mclip-word-timings";

/// Current (and only) supported format version.
pub const WORD_TIMINGS_VERSION: u32 = 1;

/// One spoken word with its position on the media timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WordTiming {
    /// The word as spoken
    pub text: String,

    /// Offset from media start, in 100 ns ticks
    #[serde(rename = "offset")]
    pub offset_ticks: u64,

    /// Spoken duration, in 100 ns ticks
    #[serde(rename = "duration")]
    pub duration_ticks: u64,
}

impl WordTiming {
    pub fn new(text: impl Into<String>, offset_ticks: u64, duration_ticks: u64) -> Self {
        Self {
            text: text.into(),
            offset_ticks,
            duration_ticks,
        }
    }

    /// Offset from media start in seconds.
    pub fn offset_seconds(&self) -> f64 {
        self.offset_ticks as f64 / TICKS_PER_SECOND
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration_ticks as f64 / TICKS_PER_SECOND
    }

    /// Offset of the end of the word in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.offset_seconds() + self.duration_seconds()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Header {
    format: String,
    version: u32,
}

/// Errors raised while reading a word-timing file.
#[derive(Debug, Error)]
pub enum WordTimingError {
    #[error("Word timing file is missing its header line")]
    MissingHeader,

    #[error("Unsupported word timing format '{format}' version {version}")]
    UnsupportedFormat { format: String, version: u32 },

    #[error("Malformed record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Empty word text on line {line}")]
    EmptyText { line: usize },

    #[error("Offset on line {line} ({offset}) is earlier than the previous word ({previous})")]
    OutOfOrder {
        line: usize,
        offset: u64,
        previous: u64,
    },

    #[error("Word on line {line} ends past the representable tick range")]
    TickOverflow { line: usize },
}

/// Parse the contents of a word-timing file.
pub fn parse_word_timings(content: &str) -> Result<Vec<WordTiming>, WordTimingError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header_raw) = lines.next().ok_or(WordTimingError::MissingHeader)?;
    let header: Header = serde_json::from_str(header_raw).map_err(|source| {
        WordTimingError::MalformedRecord {
            line: header_line,
            source,
        }
    })?;
    if header.format != WORD_TIMINGS_FORMAT || header.version != WORD_TIMINGS_VERSION {
        return Err(WordTimingError::UnsupportedFormat {
            format: header.format,
            version: header.version,
        });
    }

    let mut words: Vec<WordTiming> = Vec::new();
    for (line, raw) in lines {
        let word: WordTiming = serde_json::from_str(raw)
            .map_err(|source| WordTimingError::MalformedRecord { line, source })?;

        if word.text.trim().is_empty() {
            return Err(WordTimingError::EmptyText { line });
        }
        if word.offset_ticks.checked_add(word.duration_ticks).is_none() {
            return Err(WordTimingError::TickOverflow { line });
        }
        if let Some(previous) = words.last() {
            if word.offset_ticks < previous.offset_ticks {
                return Err(WordTimingError::OutOfOrder {
                    line,
                    offset: word.offset_ticks,
                    previous: previous.offset_ticks,
                });
            }
        }
        words.push(word);
    }

    Ok(words)
}

/// Serialize word timings into the versioned JSON Lines format.
pub fn write_word_timings(words: &[WordTiming]) -> Result<String, serde_json::Error> {
    let header = Header {
        format: WORD_TIMINGS_FORMAT.to_string(),
        version: WORD_TIMINGS_VERSION,
    };

    let mut out = serde_json::to_string(&header)?;
    out.push('\n');
    for word in words {
        out.push_str(&serde_json::to_string(word)?);
        out.push('\n');
    }
    Ok(out)
}
