#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for rendering moment clips.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - SRT caption documents burned in with the `subtitles` filter

pub mod command;
pub mod error;
pub mod progress;
pub mod render;
pub mod subtitles;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use progress::FfmpegProgress;
pub use render::{build_render_command, render_moment_clip, ClipRenderer, FfmpegClipRenderer};
pub use subtitles::{force_style, subtitles_filter, SrtDocument, SrtCue};
