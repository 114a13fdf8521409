//! Shared data models for MomentClip.
//!
//! This crate provides Serde-serializable types for:
//! - Word timings and their versioned JSON Lines format
//! - Moment requests parsed from detector output
//! - Resolved clips, captions and run manifests
//! - Encoding and caption style configuration
//!
//! It also hosts the moment aligner ([`alignment`]), which snaps requested
//! moments onto word timings and groups words into captions.

pub mod alignment;
pub mod clip;
pub mod encoding;
pub mod moment;
pub mod style;
pub mod timestamp;
pub mod word;

// Re-export common types
pub use alignment::{
    apply_policy, build_captions, resolve_all_moments, resolve_clip, resolve_moment, AlignError,
    ClipRangeIssue, FailurePolicy, MomentOutcome, PolicyHalt, ResolvedWindow,
    DEFAULT_DURATION_THRESHOLD,
};
pub use clip::{Caption, ClipManifest, ManifestEntry, ManifestError, MomentClip};
pub use encoding::EncodingConfig;
pub use moment::{collect_moments, parse_moment_line, parse_moment_lines, MomentRequest};
pub use style::{CaptionPosition, CaptionStyle};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError};
pub use word::{parse_word_timings, write_word_timings, WordTiming, WordTimingError};
