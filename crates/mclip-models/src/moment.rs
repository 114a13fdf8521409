//! Moment requests and the timestamp-pair line format.
//!
//! The moment detector emits free text. Any line containing
//! `HH:MM:SS.mmm --> HH:MM:SS.mmm` is a candidate; everything around the pair
//! is ignored.

use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alignment::AlignError;
use crate::timestamp::parse_timestamp;

fn moment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{2}:\d{2}:\d{2}\.\d{3}) --> (\d{2}:\d{2}:\d{2}\.\d{3})")
            .expect("moment pattern is a valid regex")
    })
}

/// A candidate important moment, as a half-open time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MomentRequest {
    /// Start timestamp as received (HH:MM:SS.mmm)
    pub start: String,

    /// End timestamp as received (HH:MM:SS.mmm)
    pub end: String,

    /// Start in seconds from media start
    pub start_seconds: f64,

    /// End in seconds from media start
    pub end_seconds: f64,
}

impl MomentRequest {
    /// Build a request from two timestamp strings. Start must precede end.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self, AlignError> {
        let start = start.into();
        let end = end.into();
        let line = format!("{} --> {}", start, end);

        let start_seconds = parse_timestamp(&start)
            .map_err(|e| AlignError::malformed_moment(&line, e.to_string()))?;
        let end_seconds = parse_timestamp(&end)
            .map_err(|e| AlignError::malformed_moment(&line, e.to_string()))?;

        if start_seconds >= end_seconds {
            return Err(AlignError::malformed_moment(
                &line,
                "start time must be before end time",
            ));
        }

        Ok(Self {
            start,
            end,
            start_seconds,
            end_seconds,
        })
    }

    /// Requested length in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Extract a moment from one line of detector output.
///
/// # Examples
/// ```
/// use mclip_models::moment::parse_moment_line;
/// let moment = parse_moment_line("blah 01:00:00.000 --> 01:00:05.000 blah").unwrap();
/// assert_eq!(moment.start, "01:00:00.000");
/// assert_eq!(moment.end, "01:00:05.000");
/// ```
pub fn parse_moment_line(line: &str) -> Result<MomentRequest, AlignError> {
    let caps = moment_pattern()
        .captures(line)
        .ok_or_else(|| AlignError::malformed_moment(line, "no 'HH:MM:SS.mmm --> HH:MM:SS.mmm' pair"))?;

    MomentRequest::new(&caps[1], &caps[2])
}

/// Parse every non-blank line, keeping one result per line.
pub fn parse_moment_lines(text: &str) -> Vec<Result<MomentRequest, AlignError>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_moment_line)
        .collect()
}

/// Keep the valid moments; malformed candidates are skipped.
pub fn collect_moments(text: &str) -> Vec<MomentRequest> {
    parse_moment_lines(text)
        .into_iter()
        .filter_map(|result| match result {
            Ok(moment) => Some(moment),
            Err(e) => {
                debug!(error = %e, "Skipping moment candidate");
                None
            }
        })
        .collect()
}
