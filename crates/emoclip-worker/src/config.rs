//! Worker configuration.

use std::time::Duration;

use emoclip_media::{SegmentationConfig, DEFAULT_SAMPLE_INTERVAL_SECS};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Seconds between sampled frames
    pub sample_interval_secs: f64,
    /// Confidence a detection must exceed to count
    pub match_threshold: f64,
    /// Seconds appended to the end of each segment
    pub end_buffer_secs: f64,
    /// Pause between classifier calls
    pub classify_delay: Duration,
    /// Upper bound on a single classifier call
    pub classify_timeout: Duration,
    /// Upper bound on a single frame extraction
    pub frame_extract_timeout: Duration,
    /// Width of frames sent to the classifier
    pub frame_width: u32,
    /// MJPEG qscale for extracted frames
    pub jpeg_quality: u8,
    /// Maximum concurrent detection jobs
    pub max_concurrent_jobs: usize,
    /// Work directory for uploaded videos
    pub work_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let segmentation = SegmentationConfig::default();
        Self {
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            match_threshold: segmentation.match_threshold,
            end_buffer_secs: segmentation.end_buffer_secs,
            classify_delay: Duration::from_millis(500),
            classify_timeout: Duration::from_secs(30),
            frame_extract_timeout: Duration::from_secs(30),
            frame_width: 640,
            jpeg_quality: 5,
            max_concurrent_jobs: 2,
            work_dir: "/tmp/emoclip".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_interval_secs: std::env::var("DETECT_SAMPLE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_interval_secs),
            match_threshold: std::env::var("DETECT_MATCH_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.match_threshold),
            end_buffer_secs: std::env::var("DETECT_END_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.end_buffer_secs),
            classify_delay: Duration::from_millis(
                std::env::var("DETECT_CLASSIFY_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            classify_timeout: Duration::from_secs(
                std::env::var("DETECT_CLASSIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            frame_extract_timeout: Duration::from_secs(
                std::env::var("DETECT_FRAME_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            frame_width: std::env::var("DETECT_FRAME_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_width),
            jpeg_quality: std::env::var("DETECT_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jpeg_quality),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
        }
    }

    /// Engine parameters.
    pub fn segmentation(&self) -> SegmentationConfig {
        SegmentationConfig {
            match_threshold: self.match_threshold,
            end_buffer_secs: self.end_buffer_secs,
        }
    }

    /// Reject unusable settings.
    pub fn validate(&self) -> WorkerResult<()> {
        if !self.sample_interval_secs.is_finite() || self.sample_interval_secs <= 0.0 {
            return Err(WorkerError::config_error(format!(
                "Sample interval must be positive, got {}",
                self.sample_interval_secs
            )));
        }
        self.segmentation()
            .validate()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        if self.max_concurrent_jobs == 0 {
            return Err(WorkerError::config_error("WORKER_MAX_JOBS must be at least 1"));
        }

        // Runs close on the first non-matching frame, and the next run of the same
        // emotion can start one interval later at the earliest.
        if self.end_buffer_secs > 2.0 * self.sample_interval_secs {
            return Err(WorkerError::config_error(format!(
                "End buffer {:.2}s exceeds twice the sample interval {:.2}s; segments of one emotion would overlap",
                self.end_buffer_secs, self.sample_interval_secs
            )));
        }
        Ok(())
    }
}
