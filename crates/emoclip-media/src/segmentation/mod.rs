//! Emotion segmentation.
//!
//! Turns a sparse sequence of per-frame classifier scores into
//! non-overlapping, per-emotion time ranges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Frame Sampler│───►│ Classifier   │───►│ Segmenter    │
//! │ (every 2s)   │    │ (per frame)  │    │ (per emotion)│
//! └──────────────┘    └──────────────┘    └──────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌──────────────┐
//!                                         │ Sorted       │
//!                                         │ segment list │
//!                                         └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use emoclip_media::segmentation::{EmotionSegmenter, SegmentationConfig};
//!
//! let mut segmenter = EmotionSegmenter::new(&emotions, SegmentationConfig::default())?;
//! for observation in observations {
//!     segmenter.ingest(&observation)?;
//! }
//! let segments = segmenter.finalize();
//! ```

mod config;
mod segmenter;

use emoclip_models::{Emotion, EmotionSegment, FrameObservation};

use crate::error::MediaResult;

pub use config::SegmentationConfig;
pub use segmenter::{compute_segment_stats, EmotionSegmenter, EmotionStats, SegmentStats};

/// Segment a complete, already-collected observation sequence.
pub fn segment_observations(
    emotions: &[Emotion],
    config: SegmentationConfig,
    observations: &[FrameObservation],
) -> MediaResult<Vec<EmotionSegment>> {
    let mut segmenter = EmotionSegmenter::new(emotions, config)?;
    for observation in observations {
        segmenter.ingest(observation)?;
    }
    Ok(segmenter.finalize())
}
