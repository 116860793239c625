//! Detection metrics.
//!
//! Recorded through the `metrics` facade; the API process installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, histogram};

use emoclip_models::EmotionSegment;

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_CLASSIFIED_TOTAL: &str = "emoclip_frames_classified_total";
    pub const FRAME_FAILURES_TOTAL: &str = "emoclip_frame_failures_total";
    pub const SEGMENTS_EMITTED_TOTAL: &str = "emoclip_segments_emitted_total";
    pub const DETECTION_DURATION_SECONDS: &str = "emoclip_detection_duration_seconds";
    pub const DETECTIONS_COMPLETED_TOTAL: &str = "emoclip_detections_completed_total";
    pub const DETECTIONS_FAILED_TOTAL: &str = "emoclip_detections_failed_total";
}

pub fn record_frame_classified() {
    counter!(names::FRAMES_CLASSIFIED_TOTAL).increment(1);
}

/// `reason` is a short label such as `timeout` or `extract`.
pub fn record_frame_failure(reason: &'static str) {
    counter!(names::FRAME_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_segments(segments: &[EmotionSegment]) {
    for segment in segments {
        counter!(names::SEGMENTS_EMITTED_TOTAL, "emotion" => segment.emotion.as_str()).increment(1);
    }
}

pub fn record_detection_completed(duration_secs: f64) {
    counter!(names::DETECTIONS_COMPLETED_TOTAL).increment(1);
    histogram!(names::DETECTION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_detection_failed() {
    counter!(names::DETECTIONS_FAILED_TOTAL).increment(1);
}
