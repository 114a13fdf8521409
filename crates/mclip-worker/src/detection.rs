//! Fan transcript chunks out to a moment detector.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::TranscriptWindow;
use crate::detector::{ChunkRequest, MomentDetector};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

type ChunkResult = (usize, WorkerResult<Vec<String>>);

/// Run `detector` over every chunk with a pool of `workers` tasks.
///
/// Workers pull chunks from a shared queue and send results back over a
/// channel. Lines are returned in chunk order. A failed chunk is logged and
/// contributes nothing, as does a chunk lost to a panicked worker. If no
/// chunk succeeds the last error is returned.
pub async fn detect_moments(
    detector: Arc<dyn MomentDetector>,
    chunks: Vec<String>,
    window: &TranscriptWindow,
    workers: usize,
) -> WorkerResult<Vec<String>> {
    let total = chunks.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let (job_tx, job_rx) = mpsc::channel::<ChunkRequest>(total);
    for (index, text) in chunks.into_iter().enumerate() {
        let request = ChunkRequest {
            index,
            total,
            text,
            window: window.clone(),
        };
        job_tx
            .send(request)
            .await
            .map_err(|_| WorkerError::detection_failed("chunk queue closed"))?;
    }
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<ChunkResult>();

    let worker_count = workers.clamp(1, total);
    info!(chunks = total, workers = worker_count, "Detecting moments");

    let handles: Vec<_> = (0..worker_count)
        .map(|worker_id| {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let detector = Arc::clone(&detector);

            tokio::spawn(async move {
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(request) = next else {
                        break;
                    };

                    let started = Instant::now();
                    let result = detector.detect(&request).await;
                    metrics::record_chunk_detection(result.is_ok(), started.elapsed().as_secs_f64());
                    debug!(worker_id, chunk = request.index, ok = result.is_ok(), "Chunk processed");

                    if result_tx.send((request.index, result)).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();
    drop(result_tx);

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            warn!(error = %e, "Detection worker panicked");
        }
    }

    let mut results: Vec<ChunkResult> = Vec::with_capacity(total);
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }
    results.sort_by_key(|(index, _)| *index);

    let mut lines = Vec::new();
    // Chunks held by a panicked worker never report back
    let mut failed = total - results.len();
    let mut last_error = None;
    for (index, result) in results {
        match result {
            Ok(chunk_lines) => {
                info!(chunk = index + 1, total, lines = chunk_lines.len(), "Chunk processed");
                lines.extend(chunk_lines);
            }
            Err(e) => {
                warn!(chunk = index + 1, total, error = %e, "Chunk detection failed");
                failed += 1;
                last_error = Some(e);
            }
        }
    }

    if failed == total {
        return Err(last_error
            .unwrap_or_else(|| WorkerError::detection_failed("no chunk produced a result")));
    }

    Ok(lines)
}
