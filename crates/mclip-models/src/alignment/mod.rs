//! Moment alignment and caption building.
//!
//! A requested moment is snapped onto the word timeline: the clip starts at
//! the word whose offset is nearest the requested start and ends where the
//! word nearest the requested end finishes. The words inside that window are
//! then grouped greedily into captions of roughly `duration_threshold`
//! seconds each.
//!
//! Everything here is pure. Calling it twice with the same inputs yields the
//! same outputs, and independent moments can be resolved concurrently.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clip::{Caption, MomentClip};
use crate::moment::MomentRequest;
use crate::word::WordTiming;


/// Default caption grouping threshold in seconds.
pub const DEFAULT_DURATION_THRESHOLD: f64 = 1.0;

/// Why a resolved clip range was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipRangeIssue {
    /// The resolved end does not come after the resolved start
    NonPositiveLength,
    /// The requested range does not overlap the timed words at all
    OutsideTimingData,
}

impl fmt::Display for ClipRangeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipRangeIssue::NonPositiveLength => write!(f, "end is not after start"),
            ClipRangeIssue::OutsideTimingData => write!(f, "moment lies outside the word timings"),
        }
    }
}

/// Per-moment alignment failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("No word timings available to align against")]
    EmptyTimingData,

    #[error("Malformed moment '{line}': {reason}")]
    MalformedMomentString { line: String, reason: String },

    #[error("Invalid clip range {start:.3}s..{end:.3}s: {reason}")]
    InvalidClipRange {
        start: f64,
        end: f64,
        reason: ClipRangeIssue,
    },
}

impl AlignError {
    pub(crate) fn malformed_moment(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedMomentString {
            line: line.trim().to_string(),
            reason: reason.into(),
        }
    }

    fn invalid_range(start: f64, end: f64, reason: ClipRangeIssue) -> Self {
        Self::InvalidClipRange { start, end, reason }
    }

    /// Stable snake_case tag for manifests and metrics labels.
    pub fn tag(&self) -> &'static str {
        match self {
            AlignError::EmptyTimingData => "empty_timing_data",
            AlignError::MalformedMomentString { .. } => "malformed_moment_string",
            AlignError::InvalidClipRange { .. } => "invalid_clip_range",
        }
    }
}

/// The source range chosen for a moment and the words that fall inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWindow<'a> {
    pub clip_start_seconds: f64,
    pub clip_end_seconds: f64,
    /// Words whose offset lies in `[clip_start, clip_end]`, in input order
    pub words: Vec<&'a WordTiming>,
}

/// First word minimising `distance`. Ties keep the earliest word.
fn nearest_word<F>(words: &[WordTiming], distance: F) -> &WordTiming
where
    F: Fn(&WordTiming) -> f64,
{
    let mut best = &words[0];
    let mut best_distance = distance(best);
    for word in &words[1..] {
        let d = distance(word);
        if d < best_distance {
            best = word;
            best_distance = d;
        }
    }
    best
}

/// Snap a moment onto the word timeline.
pub fn resolve_clip<'a>(
    moment: &MomentRequest,
    word_timings: &'a [WordTiming],
) -> Result<ResolvedWindow<'a>, AlignError> {
    let first = word_timings.first().ok_or(AlignError::EmptyTimingData)?;

    let covered_start = first.offset_seconds();
    let covered_end = word_timings
        .iter()
        .map(WordTiming::end_seconds)
        .fold(f64::MIN, f64::max);
    if moment.end_seconds <= covered_start || moment.start_seconds >= covered_end {
        return Err(AlignError::invalid_range(
            moment.start_seconds,
            moment.end_seconds,
            ClipRangeIssue::OutsideTimingData,
        ));
    }

    let start_boundary = nearest_word(word_timings, |w| {
        (w.offset_seconds() - moment.start_seconds).abs()
    });
    let end_boundary = nearest_word(word_timings, |w| {
        (w.end_seconds() - moment.end_seconds).abs()
    });

    let clip_start_seconds = start_boundary.offset_seconds();
    let clip_end_seconds = end_boundary.end_seconds();
    if clip_end_seconds <= clip_start_seconds {
        return Err(AlignError::invalid_range(
            clip_start_seconds,
            clip_end_seconds,
            ClipRangeIssue::NonPositiveLength,
        ));
    }

    // Never empty: the start boundary word itself starts at clip_start
    let words: Vec<&WordTiming> = word_timings
        .iter()
        .filter(|w| {
            let offset = w.offset_seconds();
            offset >= clip_start_seconds && offset <= clip_end_seconds
        })
        .collect();

    Ok(ResolvedWindow {
        clip_start_seconds,
        clip_end_seconds,
        words,
    })
}

#[derive(Default)]
struct PendingCaption {
    text: String,
    start: Option<f64>,
    duration: f64,
}

impl PendingCaption {
    fn push(&mut self, word: &WordTiming, clip_start_seconds: f64) {
        if self.start.is_none() {
            self.start = Some(word.offset_seconds() - clip_start_seconds);
        }
        self.text.push_str(&word.text);
        self.text.push(' ');
        self.duration += word.duration_seconds();
    }

    fn take(&mut self) -> Option<Caption> {
        let pending = std::mem::take(self);
        let text = pending.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Caption {
            text: text.to_string(),
            start_offset_seconds: pending.start.unwrap_or_default(),
            duration_seconds: pending.duration,
        })
    }
}

/// Group words into captions.
///
/// A caption is emitted as soon as its accumulated spoken duration reaches
/// `duration_threshold`; whatever is left at the end becomes one final,
/// possibly shorter, caption.
pub fn build_captions<'a, I>(
    words: I,
    clip_start_seconds: f64,
    duration_threshold: f64,
) -> Vec<Caption>
where
    I: IntoIterator<Item = &'a WordTiming>,
{
    let mut captions = Vec::new();
    let mut pending = PendingCaption::default();

    for word in words {
        pending.push(word, clip_start_seconds);
        if pending.duration >= duration_threshold {
            captions.extend(pending.take());
        }
    }
    captions.extend(pending.take());

    captions
}

/// Result of aligning one requested moment.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentOutcome {
    /// Position of the moment in the input
    pub index: usize,
    pub moment: MomentRequest,
    pub result: Result<MomentClip, AlignError>,
}

impl MomentOutcome {
    pub fn clip(&self) -> Option<&MomentClip> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&AlignError> {
        self.result.as_ref().err()
    }
}

/// Resolve one moment into a clip with captions.
pub fn resolve_moment(
    moment: &MomentRequest,
    word_timings: &[WordTiming],
    duration_threshold: f64,
) -> Result<MomentClip, AlignError> {
    let window = resolve_clip(moment, word_timings)?;
    let captions = build_captions(
        window.words.iter().copied(),
        window.clip_start_seconds,
        duration_threshold,
    );

    Ok(MomentClip {
        clip_start_seconds: window.clip_start_seconds,
        clip_end_seconds: window.clip_end_seconds,
        captions,
    })
}

/// Resolve every moment independently, one outcome per input, in input order.
pub fn resolve_all_moments(
    moments: &[MomentRequest],
    word_timings: &[WordTiming],
    duration_threshold: f64,
) -> Vec<MomentOutcome> {
    moments
        .iter()
        .enumerate()
        .map(|(index, moment)| {
            let result = resolve_moment(moment, word_timings, duration_threshold);
            match &result {
                Ok(clip) => debug!(
                    index,
                    clip_start = clip.clip_start_seconds,
                    clip_end = clip.clip_end_seconds,
                    captions = clip.captions.len(),
                    "Resolved moment"
                ),
                Err(e) => debug!(index, error = %e, "Moment failed to resolve"),
            }
            MomentOutcome {
                index,
                moment: moment.clone(),
                result,
            }
        })
        .collect()
}

/// What to do when a moment fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log a warning and keep going with the remaining moments
    #[default]
    SkipAndContinue,
    /// Stop at the first failed moment
    Halt,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" | "skip_and_continue" | "continue" => Ok(FailurePolicy::SkipAndContinue),
            "halt" | "stop" => Ok(FailurePolicy::Halt),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Raised by [`apply_policy`] when the policy is [`FailurePolicy::Halt`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Moment {index} failed: {error}")]
pub struct PolicyHalt {
    pub index: usize,
    #[source]
    pub error: AlignError,
}

/// Check outcomes against the failure policy.
///
/// With `SkipAndContinue` every failure is logged and `Ok` is returned.
/// With `Halt` the first failure in input order is returned as an error.
pub fn apply_policy(outcomes: &[MomentOutcome], policy: FailurePolicy) -> Result<(), PolicyHalt> {
    for outcome in outcomes {
        let Some(error) = outcome.error() else {
            continue;
        };
        match policy {
            FailurePolicy::SkipAndContinue => warn!(
                index = outcome.index,
                start = %outcome.moment.start,
                end = %outcome.moment.end,
                kind = error.tag(),
                error = %error,
                "Skipping moment"
            ),
            FailurePolicy::Halt => {
                return Err(PolicyHalt {
                    index: outcome.index,
                    error: error.clone(),
                })
            }
        }
    }
    Ok(())
}
