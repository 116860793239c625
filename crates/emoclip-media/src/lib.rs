#![deny(unreachable_patterns)]
//! Frame sampling and emotion segmentation.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building for single-frame extraction
//! - Cancellation and timeouts via tokio
//! - A pull-based frame sampler over any [`FrameSource`]
//! - The per-emotion segmentation state machine

pub mod command;
pub mod error;
pub mod frames;
pub mod probe;
pub mod segmentation;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{
    sample_timestamps, FfmpegFrameSource, FrameSampler, FrameSource, SampledFrame,
    DEFAULT_SAMPLE_INTERVAL_SECS,
};
pub use probe::{probe_video, VideoInfo};
pub use segmentation::{
    compute_segment_stats, segment_observations, EmotionSegmenter, SegmentStats,
    SegmentationConfig,
};
