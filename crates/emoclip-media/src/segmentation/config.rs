//! Configuration for emotion segmentation.
//!
//! Both values are fixed for the lifetime of one detection run.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Parameters of the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Confidence a detection must strictly exceed to count as a match (0.0-1.0).
    ///
    /// A detection exactly at the threshold is not a match.
    pub match_threshold: f64,

    /// Seconds appended after the last matching frame when a run closes.
    ///
    /// This only pads the end of a run. It never joins two runs separated
    /// by a non-matching frame. Keep it at or below twice the sampling
    /// interval if segments of one emotion must not overlap.
    pub end_buffer_secs: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            end_buffer_secs: 2.0,
        }
    }
}

impl SegmentationConfig {
    /// Builder-style setter for the match threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Builder-style setter for the end buffer.
    pub fn with_end_buffer_secs(mut self, secs: f64) -> Self {
        self.end_buffer_secs = secs;
        self
    }

    /// Reject values the state machine cannot work with.
    pub fn validate(&self) -> MediaResult<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(MediaError::invalid_input(format!(
                "Match threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !self.end_buffer_secs.is_finite() || self.end_buffer_secs < 0.0 {
            return Err(MediaError::invalid_input(format!(
                "End buffer must be a non-negative number of seconds, got {}",
                self.end_buffer_secs
            )));
        }
        Ok(())
    }
}
