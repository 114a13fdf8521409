//! SRT caption documents and the FFmpeg `subtitles` filter.

use std::fmt::Write as _;
use std::path::Path;

use mclip_models::timestamp::format_srt_timestamp;
use mclip_models::{Caption, CaptionStyle};

/// One numbered SRT cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// An SRT document whose times are relative to the clip start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SrtDocument {
    cues: Vec<SrtCue>,
}

impl SrtDocument {
    /// Build a document from a clip's captions, numbering cues from 1.
    pub fn from_captions(captions: &[Caption]) -> Self {
        let cues = captions
            .iter()
            .enumerate()
            .map(|(i, caption)| SrtCue {
                index: i + 1,
                start_seconds: caption.start_offset_seconds,
                end_seconds: caption.end_offset_seconds(),
                text: caption.text.clone(),
            })
            .collect();
        Self { cues }
    }

    pub fn cues(&self) -> &[SrtCue] {
        &self.cues
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Serialize to SRT text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for cue in &self.cues {
            // Writing into a String cannot fail
            let _ = write!(
                out,
                "{}\n{} --> {}\n{}\n\n",
                cue.index,
                format_srt_timestamp(cue.start_seconds),
                format_srt_timestamp(cue.end_seconds),
                cue.text
            );
        }
        out
    }
}

/// FFmpeg `force_style` value for a caption style.
pub fn force_style(style: &CaptionStyle) -> String {
    format!(
        "FontName={},FontSize={},PrimaryColour={},Bold={},Alignment={}",
        style.font,
        style.font_size,
        style.ass_primary_colour(),
        if style.bold { 1 } else { 0 },
        style.position.ass_alignment()
    )
}

fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
}

/// `subtitles` video filter burning `srt_path` in with `style`.
pub fn subtitles_filter(srt_path: &Path, style: &CaptionStyle) -> String {
    format!(
        "subtitles='{}':force_style='{}'",
        escape_filter_path(&srt_path.to_string_lossy()),
        force_style(style)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mclip_models::CaptionPosition;

    fn caption(text: &str, start: f64, duration: f64) -> Caption {
        Caption {
            text: text.to_string(),
            start_offset_seconds: start,
            duration_seconds: duration,
        }
    }

    #[test]
    fn test_srt_from_captions() {
        let doc = SrtDocument::from_captions(&[
            caption("hi there", 0.0, 1.0),
            caption("friend", 1.0, 1.5),
        ]);

        assert_eq!(doc.cues().len(), 2);
        assert_eq!(
            doc.render(),
            "1\n00:00:00,000 --> 00:00:01,000\nhi there\n\n\
             2\n00:00:01,000 --> 00:00:02,500\nfriend\n\n"
        );
    }

    #[test]
    fn test_empty_document() {
        let doc = SrtDocument::from_captions(&[]);
        assert!(doc.is_empty());
        assert_eq!(doc.render(), "");
    }

    #[test]
    fn test_force_style_default() {
        assert_eq!(
            force_style(&CaptionStyle::default()),
            "FontName=Arial,FontSize=50,PrimaryColour=&H0000FFFF,Bold=1,Alignment=5"
        );
    }

    #[test]
    fn test_force_style_bottom_regular() {
        let style = CaptionStyle {
            bold: false,
            position: CaptionPosition::Bottom,
            ..Default::default()
        };
        let value = force_style(&style);
        assert!(value.contains("Bold=0"));
        assert!(value.ends_with("Alignment=2"));
    }

    #[test]
    fn test_filter_escapes_path() {
        let filter = subtitles_filter(Path::new("C:/tmp/it's.srt"), &CaptionStyle::default());
        assert!(filter.starts_with("subtitles='C\\:/tmp/it\\'s.srt':force_style='FontName=Arial"));
    }
}
