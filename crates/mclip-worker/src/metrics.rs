//! Prometheus metrics for pipeline runs.

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Start the Prometheus scrape endpoint on `0.0.0.0:port`.
///
/// Must be called from inside a tokio runtime.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to start metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const RUNS_TOTAL: &str = "mclip_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "mclip_run_duration_seconds";

    pub const CHUNKS_DETECTED_TOTAL: &str = "mclip_chunks_detected_total";
    pub const DETECT_DURATION_SECONDS: &str = "mclip_detect_duration_seconds";

    pub const MOMENTS_RESOLVED_TOTAL: &str = "mclip_moments_resolved_total";

    pub const CLIPS_RENDERED_TOTAL: &str = "mclip_clips_rendered_total";
    pub const RENDER_DURATION_SECONDS: &str = "mclip_render_duration_seconds";
}

/// Record a finished run.
pub fn record_run(status: &str, duration_secs: f64) {
    let labels = [("status", status.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record one chunk sent to the moment detector.
pub fn record_chunk_detection(success: bool, duration_secs: f64) {
    let labels = [("status", status_label(success).to_string())];
    counter!(names::CHUNKS_DETECTED_TOTAL, &labels).increment(1);
    histogram!(names::DETECT_DURATION_SECONDS).record(duration_secs);
}

/// Record a moment alignment outcome; `kind` is `"ok"` or an error tag.
pub fn record_moment_resolved(kind: &str) {
    let labels = [("result", kind.to_string())];
    counter!(names::MOMENTS_RESOLVED_TOTAL, &labels).increment(1);
}

/// Record a clip render.
pub fn record_clip_render(success: bool, duration_secs: f64) {
    let labels = [("status", status_label(success).to_string())];
    counter!(names::CLIPS_RENDERED_TOTAL, &labels).increment(1);
    histogram!(names::RENDER_DURATION_SECONDS, &labels).record(duration_secs);
}

fn status_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
