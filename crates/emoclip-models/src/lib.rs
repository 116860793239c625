//! Shared data models for the EmoClip backend.
//!
//! This crate provides Serde-serializable types for:
//! - Emotion codes and label normalisation
//! - Sampled frame payloads and per-frame classifier observations
//! - Emotion segments (the engine output contract)
//! - Detection jobs and their status snapshots

pub mod emotion;
pub mod frame;
pub mod job;
pub mod observation;
pub mod request;
pub mod segment;

// Re-export common types
pub use emotion::{Emotion, UnknownEmotion};
pub use frame::FrameImage;
pub use job::{progress_percent, EmotionJob, JobId, JobStatus};
pub use observation::{Detection, FrameObservation, ObservationError};
pub use request::DetectionRequest;
pub use segment::{EmotionSegment, SegmentId};
