//! Rendering resolved moment clips with burned-in captions.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use mclip_models::{CaptionStyle, EncodingConfig, MomentClip};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::subtitles::{subtitles_filter, SrtDocument};

/// Something that turns a [`MomentClip`] into a video file.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    /// Render `clip` cut from `input` into `output`.
    ///
    /// Rendering stops with [`MediaError::Cancelled`] once `true` is
    /// published on `cancel`.
    async fn render(
        &self,
        input: &Path,
        output: &Path,
        clip: &MomentClip,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()>;
}

/// FFmpeg-backed renderer.
#[derive(Debug, Clone, Default)]
pub struct FfmpegClipRenderer {
    style: CaptionStyle,
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegClipRenderer {
    pub fn new(style: CaptionStyle, encoding: EncodingConfig) -> Self {
        Self {
            style,
            encoding,
            timeout_secs: None,
        }
    }

    /// Kill any single FFmpeg invocation running longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl ClipRenderer for FfmpegClipRenderer {
    async fn render(
        &self,
        input: &Path,
        output: &Path,
        clip: &MomentClip,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<()> {
        let mut runner = FfmpegRunner::new().with_cancel(cancel);
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        render_moment_clip(input, output, clip, &self.style, &self.encoding, &runner).await
    }
}

/// Build the FFmpeg command for one clip.
///
/// `srt_path` is `None` when the clip has no captions, in which case no
/// video filter is applied.
pub fn build_render_command(
    input: &Path,
    output: &Path,
    clip: &MomentClip,
    srt_path: Option<&Path>,
    style: &CaptionStyle,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(input, output)
        .seek(clip.clip_start_seconds)
        .duration(clip.duration_seconds());

    if let Some(srt) = srt_path {
        cmd = cmd.video_filter(subtitles_filter(srt, style));
    }

    cmd.output_args(encoding.to_ffmpeg_args())
        .output_arg("-movflags")
        .output_arg("+faststart")
}

/// Render a moment clip with its captions burned in.
pub async fn render_moment_clip(
    input: &Path,
    output: &Path,
    clip: &MomentClip,
    style: &CaptionStyle,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    if clip.duration_seconds() <= 0.0 {
        return Err(MediaError::invalid_clip(format!(
            "clip end {:.3}s is not after start {:.3}s",
            clip.clip_end_seconds, clip.clip_start_seconds
        )));
    }
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    info!(
        input = %input.display(),
        output = %output.display(),
        start = clip.clip_start_seconds,
        duration = clip.duration_seconds(),
        captions = clip.captions.len(),
        "Rendering moment clip"
    );

    // Kept alive until FFmpeg has finished reading the subtitles
    let workdir = tempfile::tempdir()?;
    let srt_path = if clip.captions.is_empty() {
        None
    } else {
        let path = workdir.path().join("captions.srt");
        let document = SrtDocument::from_captions(&clip.captions);
        tokio::fs::write(&path, document.render()).await?;
        debug!(path = %path.display(), cues = document.cues().len(), "Wrote caption file");
        Some(path)
    };

    let cmd = build_render_command(input, output, clip, srt_path.as_deref(), style, encoding);
    let duration = clip.duration_seconds();
    runner
        .run_with_progress(&cmd, move |progress| {
            debug!(
                percent = (progress.fraction_of(duration) * 100.0).round(),
                eta_secs = progress.eta_seconds(duration),
                "Render progress"
            );
        })
        .await?;

    info!(output = %output.display(), "Moment clip rendered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mclip_models::Caption;
    use std::path::PathBuf;

    fn sample_clip(captions: Vec<Caption>) -> MomentClip {
        MomentClip {
            clip_start_seconds: 12.5,
            clip_end_seconds: 20.0,
            captions,
        }
    }

    #[test]
    fn test_command_with_captions() {
        let clip = sample_clip(vec![Caption {
            text: "hello".to_string(),
            start_offset_seconds: 0.0,
            duration_seconds: 1.0,
        }]);
        let srt = PathBuf::from("/tmp/captions.srt");
        let args = build_render_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &clip,
            Some(srt.as_path()),
            &CaptionStyle::default(),
            &EncodingConfig::default(),
        )
        .build_args();

        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "12.500");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "7.500");
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("subtitles='/tmp/captions.srt'"));
        assert!(args.contains(&"libx264".to_string()));
    }

    #[test]
    fn test_command_without_captions_has_no_filter() {
        let args = build_render_command(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &sample_clip(Vec::new()),
            None,
            &CaptionStyle::default(),
            &EncodingConfig::default(),
        )
        .build_args();
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_clip() {
        let clip = MomentClip {
            clip_start_seconds: 5.0,
            clip_end_seconds: 5.0,
            captions: Vec::new(),
        };
        let result = render_moment_clip(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &clip,
            &CaptionStyle::default(),
            &EncodingConfig::default(),
            &FfmpegRunner::new(),
        )
        .await;
        assert!(matches!(result, Err(MediaError::InvalidClip(_))));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("missing.mp4");
        let result = render_moment_clip(
            &input,
            &dir.path().join("out.mp4"),
            &sample_clip(Vec::new()),
            &CaptionStyle::default(),
            &EncodingConfig::default(),
            &FfmpegRunner::new(),
        )
        .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(p)) if p == input));
    }
}
