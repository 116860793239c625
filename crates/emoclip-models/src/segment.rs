//! Emotion segment models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Emotion;

/// Identifier of a segment, unique within one detection run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SegmentId(pub String);

impl SegmentId {
    /// Id for the segment at `index` in the sorted output.
    pub fn sequential(index: usize) -> Self {
        Self(format!("segment-{}", index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time range in which an emotion was detected.
///
/// Serialized as `{ id, emotion, startTime, endTime, confidence }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmotionSegment {
    pub id: SegmentId,
    pub emotion: Emotion,
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds (includes the trailing buffer)
    pub end_time: f64,
    /// Peak confidence observed during the run
    pub confidence: f64,
}

impl EmotionSegment {
    /// Duration of this segment in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Whether the half-open ranges `[start, end)` of two segments intersect.
    pub fn overlaps(&self, other: &EmotionSegment) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64) -> EmotionSegment {
        EmotionSegment {
            id: SegmentId::sequential(0),
            emotion: Emotion::Joy,
            start_time: start,
            end_time: end,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_output_contract_field_names() {
        let json = serde_json::to_value(segment(0.0, 4.0)).unwrap();
        assert_eq!(json["id"], "segment-0");
        assert_eq!(json["emotion"], "joy");
        assert_eq!(json["startTime"], 0.0);
        assert_eq!(json["endTime"], 4.0);
        assert_eq!(json["confidence"], 0.9);
    }

    #[test]
    fn test_overlap_is_half_open() {
        assert!(segment(0.0, 4.0).overlaps(&segment(2.0, 6.0)));
        assert!(!segment(0.0, 4.0).overlaps(&segment(4.0, 6.0)));
        assert!((segment(2.0, 6.5).duration_secs() - 4.5).abs() < f64::EPSILON);
    }
}
