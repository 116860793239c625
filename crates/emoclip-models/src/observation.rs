//! Per-frame classifier observations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Emotion;

/// One `(emotion, confidence)` pair reported for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Detected emotion
    pub emotion: Emotion,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

impl Detection {
    pub fn new(emotion: Emotion, confidence: f64) -> Self {
        Self {
            emotion,
            confidence,
        }
    }
}

/// Classifier output for a single sampled instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrameObservation {
    /// Sample position in seconds
    pub timestamp: f64,
    /// At most one entry per emotion
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Reasons an observation is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("Timestamp must be finite and non-negative, got {0}")]
    InvalidTimestamp(f64),

    #[error("Confidence for {emotion} must be within [0, 1], got {confidence}")]
    ConfidenceOutOfRange { emotion: Emotion, confidence: f64 },

    #[error("Emotion {0} reported more than once")]
    DuplicateEmotion(Emotion),
}

impl FrameObservation {
    /// Create an observation from classifier detections.
    pub fn new(timestamp: f64, detections: Vec<Detection>) -> Self {
        Self {
            timestamp,
            detections,
        }
    }

    /// Observation with nothing detected.
    ///
    /// This is also how a frame whose classification failed is represented.
    pub fn empty(timestamp: f64) -> Self {
        Self::new(timestamp, Vec::new())
    }

    /// Confidence reported for `emotion`, if any.
    pub fn confidence_for(&self, emotion: Emotion) -> Option<f64> {
        self.detections
            .iter()
            .find(|d| d.emotion == emotion)
            .map(|d| d.confidence)
    }

    /// Check timestamp and detection invariants.
    pub fn validate(&self) -> Result<(), ObservationError> {
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(ObservationError::InvalidTimestamp(self.timestamp));
        }

        for (i, detection) in self.detections.iter().enumerate() {
            if !(0.0..=1.0).contains(&detection.confidence) {
                return Err(ObservationError::ConfidenceOutOfRange {
                    emotion: detection.emotion,
                    confidence: detection.confidence,
                });
            }
            if self.detections[..i]
                .iter()
                .any(|d| d.emotion == detection.emotion)
            {
                return Err(ObservationError::DuplicateEmotion(detection.emotion));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_lookup() {
        let obs = FrameObservation::new(
            4.0,
            vec![
                Detection::new(Emotion::Joy, 0.8),
                Detection::new(Emotion::Fear, 0.1),
            ],
        );

        assert_eq!(obs.confidence_for(Emotion::Joy), Some(0.8));
        assert_eq!(obs.confidence_for(Emotion::Anger), None);
        assert_eq!(FrameObservation::empty(0.0).confidence_for(Emotion::Joy), None);
    }

    #[test]
    fn test_validate_rejects_bad_timestamps() {
        assert!(matches!(
            FrameObservation::empty(-1.0).validate(),
            Err(ObservationError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            FrameObservation::empty(f64::NAN).validate(),
            Err(ObservationError::InvalidTimestamp(_))
        ));
        assert!(FrameObservation::empty(0.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let obs = FrameObservation::new(0.0, vec![Detection::new(Emotion::Joy, 1.2)]);
        assert!(matches!(
            obs.validate(),
            Err(ObservationError::ConfidenceOutOfRange { emotion: Emotion::Joy, .. })
        ));

        let obs = FrameObservation::new(0.0, vec![Detection::new(Emotion::Joy, f64::NAN)]);
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let obs = FrameObservation::new(
            0.0,
            vec![
                Detection::new(Emotion::Joy, 0.4),
                Detection::new(Emotion::Joy, 0.6),
            ],
        );
        assert_eq!(
            obs.validate(),
            Err(ObservationError::DuplicateEmotion(Emotion::Joy))
        );
    }
}
