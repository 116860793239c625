//! Detection job snapshots.
//!
//! A job snapshot is replaced wholesale on every update, so readers never
//! observe a half-applied transition.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{Emotion, EmotionSegment};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle: `uploading → processing → completed | error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Video is being received
    #[default]
    Uploading,
    /// Frames are being sampled and classified
    Processing,
    /// Segments are available
    Completed,
    /// Run aborted; see `error`
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress percentage for `processed` of `total` frames, rounded.
pub fn progress_percent(processed: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (processed as f64 / total as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Snapshot of a detection job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmotionJob {
    pub id: JobId,
    pub status: JobStatus,
    /// Progress percentage (0-100) of the current phase
    pub progress: u8,
    /// Requested emotions
    pub emotions: Vec<Emotion>,
    /// Original file name of the upload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_name: Option<String>,
    pub frames_processed: u32,
    pub frames_total: u32,
    /// Frames whose classification failed and were treated as empty
    pub frames_failed: u32,
    /// Sorted segments, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<EmotionSegment>>,
    /// Human-readable cause when status is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmotionJob {
    /// Create a job in the `uploading` state.
    pub fn new(id: JobId, emotions: Vec<Emotion>) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Uploading,
            progress: 0,
            emotions,
            video_name: None,
            frames_processed: 0,
            frames_total: 0,
            frames_failed: 0,
            segments: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Update upload progress.
    pub fn set_upload_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
    }

    /// Switch to `processing` with progress reset.
    pub fn start_processing(&mut self, frames_total: u32) {
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.frames_total = frames_total;
        self.frames_processed = 0;
        self.frames_failed = 0;
        self.segments = None;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Record one more processed frame.
    pub fn record_frame(&mut self, frames_processed: u32, failed: bool) {
        self.frames_processed = frames_processed;
        if failed {
            self.frames_failed += 1;
        }
        self.progress = progress_percent(frames_processed, self.frames_total);
        self.updated_at = Utc::now();
    }

    /// Mark job as completed with its segments.
    pub fn complete(&mut self, segments: Vec<EmotionSegment>) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.segments = Some(segments);
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Mark job as failed. Partial segments are never kept.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Error;
        self.segments = None;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }

    /// Clear run results so the job can be retried from scratch.
    pub fn reset_for_retry(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.frames_processed = 0;
        self.frames_total = 0;
        self.frames_failed = 0;
        self.segments = None;
        self.error = None;
        self.updated_at = Utc::now();
    }
}
