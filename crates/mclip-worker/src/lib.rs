//! Moment clipping worker.
//!
//! Reads word timings and moment lines (or detects moments from a cue
//! transcript with a language model), aligns the moments to word boundaries
//! and renders captioned clips with FFmpeg.

pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod transcript;

pub use config::{DetectorConfig, TranscriptWindow, WorkerConfig};
pub use detection::detect_moments;
pub use detector::{ChatCompletionsDetector, ChunkRequest, MomentDetector};
pub use error::{WorkerError, WorkerResult};
pub use executor::{ClipPipeline, PipelineReport};
pub use logging::{init_tracing, RunLogger};
pub use transcript::{chunk_transcript, parse_vtt, window_transcript, Cue};
