//! FFmpeg progress reporting.

use serde::{Deserialize, Serialize};

/// Progress snapshot parsed from `-progress pipe:2`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of a clip of `clip_duration_secs` rendered so far, in `[0, 1]`.
    pub fn fraction_of(&self, clip_duration_secs: f64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if clip_duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / clip_duration_secs).clamp(0.0, 1.0)
    }

    /// Estimated seconds until the clip finishes, when speed is known.
    pub fn eta_seconds(&self, clip_duration_secs: f64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }
        let remaining = clip_duration_secs - self.out_time_ms as f64 / 1000.0;
        Some((remaining / self.speed).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_of_clip() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert!((progress.fraction_of(10.0) - 0.5).abs() < 1e-9);
        assert_eq!(progress.fraction_of(2.0), 1.0);
        assert_eq!(progress.fraction_of(0.0), 0.0);
    }

    #[test]
    fn test_complete_is_full() {
        let progress = FfmpegProgress {
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(progress.fraction_of(30.0), 1.0);
    }

    #[test]
    fn test_eta() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };
        let eta = progress.eta_seconds(10.0).unwrap();
        assert!((eta - 2.5).abs() < 1e-9);
        assert!(FfmpegProgress::default().eta_seconds(10.0).is_none());
    }
}
