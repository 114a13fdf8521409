//! Pipeline executor.
//!
//! One run goes: word timings → moment lines (file or detector) → alignment
//! → failure policy → parallel rendering → `manifest.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn, Instrument};

use mclip_media::{ClipRenderer, FfmpegClipRenderer, MediaError};
use mclip_models::{
    apply_policy, collect_moments, parse_word_timings, resolve_all_moments, ClipManifest,
    ManifestEntry, ManifestError, MomentOutcome, WordTiming,
};

use crate::config::WorkerConfig;
use crate::detection::detect_moments;
use crate::detector::MomentDetector;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::transcript::{chunk_transcript, parse_vtt, window_transcript};

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: String,
    /// Valid moment lines found
    pub moments: usize,
    /// Moments that aligned to a clip
    pub resolved: usize,
    /// Clips written to disk
    pub rendered: usize,
    /// Moments with an alignment or render error
    pub failed: usize,
    /// Whether the run was cancelled while rendering
    pub cancelled: bool,
    pub manifest_path: PathBuf,
    pub outputs: Vec<PathBuf>,
}

/// Moment clipping pipeline.
pub struct ClipPipeline {
    config: WorkerConfig,
    detector: Option<Arc<dyn MomentDetector>>,
    renderer: Arc<dyn ClipRenderer>,
    cancel: watch::Sender<bool>,
}

impl ClipPipeline {
    /// Create a pipeline rendering with FFmpeg.
    ///
    /// A detector is required when the config asks for moment detection.
    pub fn new(
        config: WorkerConfig,
        detector: Option<Arc<dyn MomentDetector>>,
    ) -> WorkerResult<Self> {
        if config.detects_moments() && detector.is_none() {
            return Err(WorkerError::config_error(
                "MCLIP_TRANSCRIPT is set but no moment detector is configured (set GROQ_API_KEY or MCLIP_LLM_API_KEY)",
            ));
        }

        let renderer = FfmpegClipRenderer::new(config.caption_style.clone(), config.encoding.clone())
            .with_timeout(config.ffmpeg_timeout.as_secs());
        let (cancel, _) = watch::channel(false);

        Ok(Self {
            config,
            detector,
            renderer: Arc::new(renderer),
            cancel,
        })
    }

    /// Replace the clip renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn ClipRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Stop in-flight and pending renders.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Run the pipeline once.
    pub async fn run(&self) -> WorkerResult<PipelineReport> {
        let logger = RunLogger::new("pipeline");
        let span = logger.create_span();
        let started = Instant::now();

        let result = self.run_inner(&logger).instrument(span).await;

        let status = match &result {
            Ok(report) if report.cancelled => "cancelled",
            Ok(_) => "success",
            Err(WorkerError::Halted(_)) => "halted",
            Err(_) => "failure",
        };
        metrics::record_run(status, started.elapsed().as_secs_f64());
        result
    }

    async fn run_inner(&self, logger: &RunLogger) -> WorkerResult<PipelineReport> {
        logger.log_start(&format!("video {}", self.config.video_path.display()));

        let words = self.load_word_timings().await?;
        logger.log_progress(&format!("loaded {} word timings", words.len()));

        let moment_text = if self.config.detects_moments() {
            self.detect(&logger.for_stage("detect")).await?
        } else {
            tokio::fs::read_to_string(&self.config.moments_path).await?
        };

        let moments = collect_moments(&moment_text);
        if moments.is_empty() {
            logger.log_warning("no valid moment lines found");
        }

        let outcomes = resolve_all_moments(&moments, &words, self.config.duration_threshold);
        for outcome in &outcomes {
            metrics::record_moment_resolved(outcome.error().map_or("ok", |e| e.tag()));
        }
        let resolved = outcomes.iter().filter(|o| o.result.is_ok()).count();
        logger.log_progress(&format!("resolved {}/{} moments", resolved, outcomes.len()));

        tokio::fs::create_dir_all(&self.config.output_dir).await?;

        if let Err(halt) = apply_policy(&outcomes, self.config.failure_policy) {
            let entries = outcomes.iter().map(|o| alignment_entry(o, None)).collect();
            self.write_manifest(logger, entries).await?;
            logger.log_error(&halt.to_string());
            return Err(halt.into());
        }

        let renders = self.render_all(&logger.for_stage("render"), &outcomes).await;

        let mut outputs = Vec::new();
        let mut cancelled = false;
        let entries: Vec<ManifestEntry> = outcomes
            .iter()
            .zip(renders)
            .map(|(outcome, render)| match render {
                Some(Ok(path)) => {
                    let entry = alignment_entry(outcome, Some(&path));
                    outputs.push(path);
                    entry
                }
                Some(Err(e)) => {
                    cancelled |= matches!(e, MediaError::Cancelled);
                    ManifestEntry {
                        error: Some(ManifestError {
                            kind: e.tag().to_string(),
                            message: e.to_string(),
                        }),
                        ..alignment_entry(outcome, None)
                    }
                }
                None => alignment_entry(outcome, None),
            })
            .collect();

        let failed = entries.iter().filter(|e| !e.is_success()).count();
        let manifest_path = self.write_manifest(logger, entries).await?;

        logger.log_completion(&format!(
            "{} clips rendered, {} moments failed",
            outputs.len(),
            failed
        ));

        Ok(PipelineReport {
            run_id: logger.run_id().to_string(),
            moments: moments.len(),
            resolved,
            rendered: outputs.len(),
            failed,
            cancelled,
            manifest_path,
            outputs,
        })
    }

    async fn load_word_timings(&self) -> WorkerResult<Vec<WordTiming>> {
        let content = tokio::fs::read_to_string(&self.config.word_timings_path).await?;
        Ok(parse_word_timings(&content)?)
    }

    /// Detect moments from the cue transcript and persist the raw lines.
    async fn detect(&self, logger: &RunLogger) -> WorkerResult<String> {
        let (Some(detector), Some(transcript_path)) =
            (self.detector.as_ref(), self.config.transcript_path.as_ref())
        else {
            return Err(WorkerError::config_error("moment detection is not configured"));
        };

        let content = tokio::fs::read_to_string(transcript_path).await?;
        let cues = parse_vtt(&content);
        let window = &self.config.window;
        let text = window_transcript(&cues, window.start_seconds, window.end_seconds);
        let chunks = chunk_transcript(&text, self.config.chunk_max_words);
        logger.log_start(&format!("{} cues, {} chunks", cues.len(), chunks.len()));

        let lines = detect_moments(
            Arc::clone(detector),
            chunks,
            window,
            self.config.detect_workers,
        )
        .await?;

        let mut text = lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        if let Some(parent) = self.config.moments_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.config.moments_path, &text).await?;
        logger.log_completion(&format!(
            "{} lines written to {}",
            lines.len(),
            self.config.moments_path.display()
        ));

        Ok(text)
    }

    /// Render every resolved moment; `None` for moments that did not resolve.
    async fn render_all(
        &self,
        logger: &RunLogger,
        outcomes: &[MomentOutcome],
    ) -> Vec<Option<Result<PathBuf, MediaError>>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_render_parallel));
        let video = self.config.video_path.as_path();

        let futures: Vec<_> = outcomes
            .iter()
            .map(|outcome| {
                let semaphore = Arc::clone(&semaphore);
                let renderer = Arc::clone(&self.renderer);
                let cancel_rx = self.cancel.subscribe();
                let output = self.config.clip_path(outcome.index);

                async move {
                    let clip = outcome.clip()?;
                    Some(render_one(renderer, semaphore, cancel_rx, video, output, outcome.index, clip).await)
                }
            })
            .collect();

        let results = join_all(futures).await;
        let failures = results.iter().filter(|r| matches!(r, Some(Err(_)))).count();
        if failures > 0 {
            logger.log_warning(&format!("{} renders failed", failures));
        }
        results
    }

    async fn write_manifest(
        &self,
        logger: &RunLogger,
        entries: Vec<ManifestEntry>,
    ) -> WorkerResult<PathBuf> {
        let manifest = ClipManifest::new(
            logger.run_id(),
            self.config.video_path.to_string_lossy(),
            self.config.duration_threshold,
            entries,
        );
        let path = self.config.manifest_path();
        tokio::fs::write(&path, serde_json::to_string_pretty(&manifest)?).await?;
        info!(
            path = %path.display(),
            succeeded = manifest.succeeded(),
            failed = manifest.failed(),
            "Manifest written"
        );
        Ok(path)
    }
}

async fn render_one(
    renderer: Arc<dyn ClipRenderer>,
    semaphore: Arc<Semaphore>,
    cancel_rx: watch::Receiver<bool>,
    video: &Path,
    output: PathBuf,
    index: usize,
    clip: &mclip_models::MomentClip,
) -> Result<PathBuf, MediaError> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| MediaError::Cancelled)?;
    if *cancel_rx.borrow() {
        return Err(MediaError::Cancelled);
    }

    let started = Instant::now();
    let result = renderer.render(video, &output, clip, cancel_rx).await;
    metrics::record_clip_render(result.is_ok(), started.elapsed().as_secs_f64());

    match result {
        Ok(()) => Ok(output),
        Err(e) => {
            warn!(index, output = %output.display(), kind = e.tag(), error = %e, "Render failed");
            Err(e)
        }
    }
}

fn alignment_entry(outcome: &MomentOutcome, output: Option<&Path>) -> ManifestEntry {
    ManifestEntry {
        index: outcome.index,
        moment: outcome.moment.clone(),
        clip: outcome.clip().cloned(),
        output: output.map(|p| p.to_string_lossy().into_owned()),
        error: outcome.error().map(|e| ManifestError {
            kind: e.tag().to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranscriptWindow;
    use crate::detector::ChunkRequest;
    use async_trait::async_trait;
    use mclip_models::{write_word_timings, FailurePolicy, MomentClip};
    use std::sync::Mutex as StdMutex;

    /// Writes the clip duration into the output file instead of running FFmpeg.
    #[derive(Default)]
    struct FakeRenderer {
        fail_index_path: Option<String>,
        rendered: StdMutex<Vec<MomentClip>>,
    }

    #[async_trait]
    impl ClipRenderer for FakeRenderer {
        async fn render(
            &self,
            _input: &Path,
            output: &Path,
            clip: &MomentClip,
            cancel: watch::Receiver<bool>,
        ) -> mclip_media::MediaResult<()> {
            if *cancel.borrow() {
                return Err(MediaError::Cancelled);
            }
            if let Some(fail) = &self.fail_index_path {
                if output.to_string_lossy().ends_with(fail.as_str()) {
                    return Err(MediaError::ffmpeg_failed("boom", None, Some(1)));
                }
            }
            self.rendered.lock().unwrap().push(clip.clone());
            tokio::fs::write(output, format!("{}", clip.duration_seconds())).await?;
            Ok(())
        }
    }

    struct FixedDetector(Vec<String>);

    #[async_trait]
    impl MomentDetector for FixedDetector {
        async fn detect(&self, _request: &ChunkRequest) -> WorkerResult<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    fn words() -> Vec<WordTiming> {
        vec![
            WordTiming::new("hi", 0, 5_000_000),
            WordTiming::new("there", 5_000_000, 5_000_000),
            WordTiming::new("friend", 10_000_000, 10_000_000),
            WordTiming::new("later", 30_000_000, 10_000_000),
        ]
    }

    async fn setup(dir: &Path, moments: &str) -> WorkerConfig {
        let timings = dir.join("words.jsonl");
        tokio::fs::write(&timings, write_word_timings(&words()).unwrap())
            .await
            .unwrap();
        let moments_path = dir.join("moments.txt");
        tokio::fs::write(&moments_path, moments).await.unwrap();

        WorkerConfig {
            video_path: dir.join("video.mp4"),
            word_timings_path: timings,
            moments_path,
            output_dir: dir.join("out"),
            ..WorkerConfig::default()
        }
    }

    async fn read_manifest(path: &Path) -> ClipManifest {
        let content = tokio::fs::read_to_string(path).await.unwrap();
        serde_json::from_str(&content).unwrap()
    }

    #[tokio::test]
    async fn test_run_renders_resolved_moments_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(
            dir.path(),
            "1. 00:00:00.000 --> 00:00:02.000\nnot a moment\n00:00:50.000 --> 00:00:55.000\n",
        )
        .await;
        let renderer = Arc::new(FakeRenderer::default());
        let pipeline = ClipPipeline::new(config, None)
            .unwrap()
            .with_renderer(renderer.clone());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.moments, 2);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.rendered, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.cancelled);
        assert_eq!(report.outputs, vec![dir.path().join("out/clip_0.mp4")]);

        let rendered = renderer.rendered.lock().unwrap().clone();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].clip_start_seconds, 0.0);
        assert_eq!(rendered[0].clip_end_seconds, 2.0);
        let texts: Vec<&str> = rendered[0].captions.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["hi there", "friend"]);

        let manifest = read_manifest(&report.manifest_path).await;
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.entries[0].output.is_some());
        assert_eq!(
            manifest.entries[1].error.as_ref().unwrap().kind,
            "invalid_clip_range"
        );
    }

    #[tokio::test]
    async fn test_halt_policy_stops_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(
            dir.path(),
            "00:00:50.000 --> 00:00:55.000\n00:00:00.000 --> 00:00:02.000\n",
        )
        .await;
        config.failure_policy = FailurePolicy::Halt;
        let manifest_path = config.manifest_path();
        let renderer = Arc::new(FakeRenderer::default());
        let pipeline = ClipPipeline::new(config, None)
            .unwrap()
            .with_renderer(renderer.clone());

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, WorkerError::Halted(ref halt) if halt.index == 0));
        assert!(renderer.rendered.lock().unwrap().is_empty());

        let manifest = read_manifest(&manifest_path).await;
        assert_eq!(manifest.entries.len(), 2);
        assert!(manifest.entries.iter().all(|e| e.output.is_none()));
    }

    #[tokio::test]
    async fn test_render_failure_only_affects_its_moment() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(
            dir.path(),
            "00:00:00.000 --> 00:00:01.000\n00:00:01.000 --> 00:00:02.000\n",
        )
        .await;
        let renderer = Arc::new(FakeRenderer {
            fail_index_path: Some("clip_0.mp4".to_string()),
            ..Default::default()
        });
        let pipeline = ClipPipeline::new(config, None)
            .unwrap()
            .with_renderer(renderer);

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.rendered, 1);
        assert_eq!(report.failed, 1);

        let manifest = read_manifest(&report.manifest_path).await;
        let error = manifest.entries[0].error.as_ref().unwrap();
        assert_eq!(error.kind, "ffmpeg_failed");
        assert!(manifest.entries[1].is_success());
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_cancelled_moments() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), "00:00:00.000 --> 00:00:02.000\n").await;
        let pipeline = ClipPipeline::new(config, None)
            .unwrap()
            .with_renderer(Arc::new(FakeRenderer::default()));

        pipeline.cancel();
        let report = pipeline.run().await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.rendered, 0);
        let manifest = read_manifest(&report.manifest_path).await;
        assert_eq!(manifest.entries[0].error.as_ref().unwrap().kind, "cancelled");
    }

    #[tokio::test]
    async fn test_detection_writes_moments_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = setup(dir.path(), "").await;
        let transcript = dir.path().join("talk.vtt");
        tokio::fs::write(
            &transcript,
            "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nhi there friend\n",
        )
        .await
        .unwrap();
        config.transcript_path = Some(transcript);
        config.window = TranscriptWindow::default();
        let moments_path = config.moments_path.clone();

        let detector: Arc<dyn MomentDetector> = Arc::new(FixedDetector(vec![
            "00:00:00.000 --> 00:00:02.000".to_string(),
        ]));
        let pipeline = ClipPipeline::new(config, Some(detector))
            .unwrap()
            .with_renderer(Arc::new(FakeRenderer::default()));

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.rendered, 1);

        let written = tokio::fs::read_to_string(&moments_path).await.unwrap();
        assert_eq!(written, "00:00:00.000 --> 00:00:02.000\n");
    }

    #[test]
    fn test_detection_requires_detector() {
        let config = WorkerConfig {
            transcript_path: Some(PathBuf::from("talk.vtt")),
            ..WorkerConfig::default()
        };
        assert!(matches!(
            ClipPipeline::new(config, None),
            Err(WorkerError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_word_timings_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = setup(dir.path(), "").await;
        tokio::fs::write(&config.word_timings_path, "{\"text\":\"hi\",\"offset\":0,\"duration\":1}\n")
            .await
            .unwrap();
        let pipeline = ClipPipeline::new(config, None).unwrap();

        assert!(matches!(
            pipeline.run().await,
            Err(WorkerError::WordTimings(_))
        ));
    }
}
