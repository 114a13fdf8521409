//! Worker configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded by
//! the binaries). Parsing goes through a lookup function so it can be
//! exercised without touching the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mclip_models::{
    parse_timestamp, CaptionPosition, CaptionStyle, EncodingConfig, FailurePolicy,
    DEFAULT_DURATION_THRESHOLD,
};

use crate::error::{WorkerError, WorkerResult};

/// Default OpenAI-compatible endpoint (Groq).
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Language model settings for moment detection.
#[derive(Clone)]
pub struct DetectorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Upper bound on a moment's length; the prompt asks for at least half of it
    pub max_moment_secs: u32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub request_timeout: Duration,
}

// Keeps the API key out of `Worker config: {:?}` logs.
impl std::fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_moment_secs", &self.max_moment_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DetectorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_LLM_MODEL.to_string(),
            max_moment_secs: 180,
            temperature: 0.5,
            max_tokens: 1024,
            top_p: 1.0,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Optional time window applied to the cue transcript before detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptWindow {
    /// Raw `HH:MM:SS.mmm` value, echoed into the prompt
    pub start: Option<String>,
    pub end: Option<String>,
    pub start_seconds: Option<f64>,
    pub end_seconds: Option<f64>,
}

impl TranscriptWindow {
    pub fn new(start: Option<String>, end: Option<String>) -> WorkerResult<Self> {
        let parse = |name: &str, value: &Option<String>| -> WorkerResult<Option<f64>> {
            value
                .as_deref()
                .map(|v| {
                    parse_timestamp(v)
                        .map_err(|e| WorkerError::config_error(format!("{}: {}", name, e)))
                })
                .transpose()
        };
        let start_seconds = parse("MCLIP_WINDOW_START", &start)?;
        let end_seconds = parse("MCLIP_WINDOW_END", &end)?;

        if let (Some(s), Some(e)) = (start_seconds, end_seconds) {
            if e <= s {
                return Err(WorkerError::config_error(
                    "MCLIP_WINDOW_END must be after MCLIP_WINDOW_START",
                ));
            }
        }

        Ok(Self {
            start,
            end,
            start_seconds,
            end_seconds,
        })
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Source video the clips are cut from
    pub video_path: PathBuf,
    /// Word timings in JSON Lines format
    pub word_timings_path: PathBuf,
    /// WebVTT transcript; when set, moments are detected instead of read
    pub transcript_path: Option<PathBuf>,
    /// Moment lines, read as input or written after detection
    pub moments_path: PathBuf,
    pub output_dir: PathBuf,
    /// Clips are written as `<output_prefix>_<index>.mp4`
    pub output_prefix: String,
    pub window: TranscriptWindow,
    /// Seconds of speech grouped into one caption
    pub duration_threshold: f64,
    pub failure_policy: FailurePolicy,
    /// Maximum clips rendered concurrently
    pub max_render_parallel: usize,
    /// Worker tasks sending chunks to the detector
    pub detect_workers: usize,
    /// Word budget for one transcript chunk
    pub chunk_max_words: usize,
    /// Per-clip FFmpeg timeout
    pub ffmpeg_timeout: Duration,
    pub caption_style: CaptionStyle,
    pub encoding: EncodingConfig,
    pub detector: Option<DetectorConfig>,
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::from("video.mp4"),
            word_timings_path: PathBuf::from("word_timings.jsonl"),
            transcript_path: None,
            moments_path: PathBuf::from("output/moments.txt"),
            output_dir: PathBuf::from("output"),
            output_prefix: "clip".to_string(),
            window: TranscriptWindow::default(),
            duration_threshold: DEFAULT_DURATION_THRESHOLD,
            failure_policy: FailurePolicy::default(),
            max_render_parallel: 2,
            detect_workers: 4,
            chunk_max_words: 10_000,
            ffmpeg_timeout: Duration::from_secs(1800), // 30 minutes
            caption_style: CaptionStyle::default(),
            encoding: EncodingConfig::default(),
            detector: None,
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let output_dir = var("MCLIP_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);
        let moments_path = var("MCLIP_MOMENTS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| output_dir.join("moments.txt"));
        let transcript_path = var("MCLIP_TRANSCRIPT").map(PathBuf::from);

        let detector = match var("MCLIP_LLM_API_KEY").or_else(|| var("GROQ_API_KEY")) {
            Some(api_key) => {
                let base = DetectorConfig::new(api_key);
                Some(DetectorConfig {
                    base_url: var("MCLIP_LLM_BASE_URL").unwrap_or(base.base_url),
                    model: var("MCLIP_LLM_MODEL").unwrap_or(base.model),
                    max_moment_secs: parse_var(&var, "MCLIP_MAX_MOMENT_SECS")?
                        .unwrap_or(base.max_moment_secs),
                    temperature: parse_var(&var, "MCLIP_LLM_TEMPERATURE")?
                        .unwrap_or(base.temperature),
                    request_timeout: parse_var(&var, "MCLIP_LLM_TIMEOUT_SECS")?
                        .map(Duration::from_secs)
                        .unwrap_or(base.request_timeout),
                    ..base
                })
            }
            None => None,
        };

        let mut caption_style = defaults.caption_style;
        if let Some(font) = var("MCLIP_CAPTION_FONT") {
            caption_style.font = font;
        }
        if let Some(size) = parse_var(&var, "MCLIP_CAPTION_FONT_SIZE")? {
            caption_style.font_size = size;
        }
        if let Some(color) = var("MCLIP_CAPTION_COLOR") {
            caption_style.color = color;
        }
        if let Some(position) = var("MCLIP_CAPTION_POSITION") {
            caption_style.position = parse_position(&position)?;
        }

        let mut encoding = defaults.encoding;
        if let Some(crf) = parse_var(&var, "MCLIP_VIDEO_CRF")? {
            encoding = encoding.with_crf(crf);
        }
        if let Some(preset) = var("MCLIP_VIDEO_PRESET") {
            encoding = encoding.with_preset(preset);
        }

        let config = Self {
            video_path: var("MCLIP_VIDEO")
                .map(PathBuf::from)
                .unwrap_or(defaults.video_path),
            word_timings_path: var("MCLIP_WORD_TIMINGS")
                .map(PathBuf::from)
                .unwrap_or(defaults.word_timings_path),
            transcript_path,
            moments_path,
            output_dir,
            output_prefix: var("MCLIP_OUTPUT_PREFIX").unwrap_or(defaults.output_prefix),
            window: TranscriptWindow::new(var("MCLIP_WINDOW_START"), var("MCLIP_WINDOW_END"))?,
            duration_threshold: parse_var(&var, "MCLIP_DURATION_THRESHOLD")?
                .unwrap_or(defaults.duration_threshold),
            failure_policy: parse_var(&var, "MCLIP_FAILURE_POLICY")?
                .unwrap_or(defaults.failure_policy),
            max_render_parallel: parse_var(&var, "MCLIP_MAX_RENDER_PARALLEL")?
                .unwrap_or(defaults.max_render_parallel),
            detect_workers: parse_var(&var, "MCLIP_DETECT_WORKERS")?
                .unwrap_or(defaults.detect_workers),
            chunk_max_words: parse_var(&var, "MCLIP_CHUNK_MAX_WORDS")?
                .unwrap_or(defaults.chunk_max_words),
            ffmpeg_timeout: parse_var(&var, "MCLIP_FFMPEG_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            caption_style,
            encoding,
            detector,
            metrics_port: parse_var(&var, "METRICS_PORT")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if !(self.duration_threshold.is_finite() && self.duration_threshold > 0.0) {
            return Err(WorkerError::config_error(
                "MCLIP_DURATION_THRESHOLD must be a positive number",
            ));
        }
        if self.max_render_parallel == 0 {
            return Err(WorkerError::config_error("MCLIP_MAX_RENDER_PARALLEL must be at least 1"));
        }
        if self.detect_workers == 0 {
            return Err(WorkerError::config_error("MCLIP_DETECT_WORKERS must be at least 1"));
        }
        if self.chunk_max_words == 0 {
            return Err(WorkerError::config_error("MCLIP_CHUNK_MAX_WORDS must be at least 1"));
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err(WorkerError::config_error(
                "MCLIP_OUTPUT_PREFIX must not contain path separators",
            ));
        }
        Ok(())
    }

    /// Whether moments come from the language model rather than a file.
    pub fn detects_moments(&self) -> bool {
        self.transcript_path.is_some()
    }

    /// Output path of the clip for moment `index`.
    pub fn clip_path(&self, index: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.mp4", self.output_prefix, index))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.output_dir.join("manifest.json")
    }
}

fn parse_var<T, V>(var: &V, key: &str) -> WorkerResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| WorkerError::config_error(format!("{}={}: {}", key, raw, e)))
        })
        .transpose()
}

fn parse_position(value: &str) -> WorkerResult<CaptionPosition> {
    match value.to_ascii_lowercase().as_str() {
        "bottom" => Ok(CaptionPosition::Bottom),
        "center" | "middle" => Ok(CaptionPosition::Center),
        "top" => Ok(CaptionPosition::Top),
        other => Err(WorkerError::config_error(format!(
            "unknown caption position '{}'",
            other
        ))),
    }
}
