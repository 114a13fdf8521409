//! Moment clipping worker binary.

use std::sync::Arc;

use tracing::{error, info, warn};

use mclip_worker::{
    init_tracing, metrics, ChatCompletionsDetector, ClipPipeline, MomentDetector, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting mclip-worker");

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::install_exporter(port) {
            Ok(()) => info!(port, "Metrics exporter listening"),
            Err(e) => warn!("{}", e),
        }
    }

    let detector: Option<Arc<dyn MomentDetector>> = match config.detector.clone() {
        Some(detector_config) if config.detects_moments() => {
            match ChatCompletionsDetector::new(detector_config) {
                Ok(detector) => Some(Arc::new(detector)),
                Err(e) => {
                    error!("Failed to create moment detector: {}", e);
                    std::process::exit(1);
                }
            }
        }
        _ => None,
    };

    let pipeline = match ClipPipeline::new(config, detector) {
        Ok(pipeline) => Arc::new(pipeline),
        Err(e) => {
            error!("Failed to create pipeline: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl-C cancels in-flight renders; the manifest is still written
    let signal_pipeline = Arc::clone(&pipeline);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_pipeline.cancel();
        }
    });

    match pipeline.run().await {
        Ok(report) => {
            info!(
                run_id = %report.run_id,
                moments = report.moments,
                rendered = report.rendered,
                failed = report.failed,
                manifest = %report.manifest_path.display(),
                "Run complete"
            );
            if report.cancelled {
                std::process::exit(130);
            }
        }
        Err(e) => {
            error!(retryable = e.is_retryable(), "Run failed: {}", e);
            std::process::exit(1);
        }
    }
}
