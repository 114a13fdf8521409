//! Structured run logging utilities.
//!
//! Every pipeline run gets a run id; the [`RunLogger`] stamps it, together
//! with the current stage, on each lifecycle event.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

/// Run logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    stage: String,
}

impl RunLogger {
    /// Create a logger for a fresh run.
    pub fn new(stage: &str) -> Self {
        Self::from_string(&Uuid::new_v4().to_string(), stage)
    }

    /// Create a logger for an existing run id.
    pub fn from_string(run_id: &str, stage: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same run, different stage.
    pub fn for_stage(&self, stage: &str) -> Self {
        Self::from_string(&self.run_id, stage)
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, stage = %self.stage, "Stage warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, stage = %self.stage, "Stage error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Create a tracing span carrying the run id and stage.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, stage = %self.stage)
    }
}

/// Install the global tracing subscriber.
///
/// Colored human-readable output by default, JSON when `LOG_FORMAT=json`.
/// `RUST_LOG` sets the base filter; the mclip crates log at `info`.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["mclip_worker=info", "mclip_media=info", "mclip_models=info"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
