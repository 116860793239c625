//! Emotion detection worker.
//!
//! This crate provides:
//! - The sequential detection loop ([`EmotionDetector`])
//! - Job status publishing ([`JobTracker`])
//! - Configuration, structured logging and metrics shared with the API

pub mod config;
pub mod detector;
pub mod error;
pub mod failures;
pub mod logging;
pub mod metrics;
pub mod tracker;

pub use config::WorkerConfig;
pub use detector::EmotionDetector;
pub use error::{WorkerError, WorkerResult};
pub use failures::FailureTracker;
pub use logging::JobLogger;
pub use tracker::JobTracker;
