//! Resolved clips, captions and the run manifest.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::moment::MomentRequest;

/// A run of words displayed together as one subtitle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Caption {
    /// Words joined by single spaces
    pub text: String,

    /// Seconds from the start of the clip (not the source media)
    pub start_offset_seconds: f64,

    /// Total spoken duration of the grouped words
    pub duration_seconds: f64,
}

impl Caption {
    /// Offset at which the caption disappears, relative to the clip start.
    pub fn end_offset_seconds(&self) -> f64 {
        self.start_offset_seconds + self.duration_seconds
    }
}

/// The source range to extract for one moment, with its captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MomentClip {
    /// Start of the extracted range in source seconds
    pub clip_start_seconds: f64,

    /// End of the extracted range in source seconds
    pub clip_end_seconds: f64,

    /// Captions in display order
    pub captions: Vec<Caption>,
}

impl MomentClip {
    /// Length of the extracted range.
    pub fn duration_seconds(&self) -> f64 {
        self.clip_end_seconds - self.clip_start_seconds
    }
}

/// Failure recorded against a moment in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestError {
    /// Stable error tag (e.g. `invalid_clip_range`)
    pub kind: String,

    /// Human readable detail
    pub message: String,
}

/// One moment's outcome in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestEntry {
    /// Position of the moment in the input (0-indexed)
    pub index: usize,

    /// Requested moment
    pub moment: MomentRequest,

    /// Resolved clip, when alignment succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<MomentClip>,

    /// Rendered file, when rendering succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Alignment or rendering failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ManifestError>,
}

impl ManifestEntry {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a pipeline run, written next to the rendered clips.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipManifest {
    /// Run identifier
    pub run_id: String,

    /// Source video path
    pub source_video: String,

    /// Caption grouping threshold used (seconds)
    pub duration_threshold: f64,

    /// When the manifest was written
    pub generated_at: DateTime<Utc>,

    /// One entry per moment, in input order
    pub entries: Vec<ManifestEntry>,
}

impl ClipManifest {
    pub fn new(
        run_id: impl Into<String>,
        source_video: impl Into<String>,
        duration_threshold: f64,
        entries: Vec<ManifestEntry>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            source_video: source_video.into(),
            duration_threshold,
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Number of moments that produced a clip without error.
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_success()).count()
    }

    /// Number of moments with a recorded error.
    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moment() -> MomentRequest {
        MomentRequest::new("00:00:00.000", "00:00:02.000").unwrap()
    }

    #[test]
    fn test_caption_end_offset() {
        let caption = Caption {
            text: "hi there".to_string(),
            start_offset_seconds: 0.5,
            duration_seconds: 1.0,
        };
        assert_eq!(caption.end_offset_seconds(), 1.5);
    }

    #[test]
    fn test_manifest_counts() {
        let ok = ManifestEntry {
            index: 0,
            moment: moment(),
            clip: Some(MomentClip {
                clip_start_seconds: 0.0,
                clip_end_seconds: 2.0,
                captions: Vec::new(),
            }),
            output: Some("out_0.mp4".to_string()),
            error: None,
        };
        let failed = ManifestEntry {
            index: 1,
            moment: moment(),
            clip: None,
            output: None,
            error: Some(ManifestError {
                kind: "invalid_clip_range".to_string(),
                message: "end before start".to_string(),
            }),
        };

        let manifest = ClipManifest::new("run", "video.mp4", 1.0, vec![ok, failed]);
        assert_eq!(manifest.succeeded(), 1);
        assert_eq!(manifest.failed(), 1);
    }

    #[test]
    fn test_manifest_entry_omits_empty_fields() {
        let entry = ManifestEntry {
            index: 3,
            moment: moment(),
            clip: None,
            output: None,
            error: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("clip").is_none());
        assert!(json.get("output").is_none());
        assert_eq!(json["moment"]["start"], "00:00:00.000");
    }
}
