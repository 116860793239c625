//! Axum HTTP API for emotion detection jobs.
//!
//! This crate provides:
//! - Video upload with streamed progress and background detection
//! - Job status polling, segment listing, cancel and retry
//! - Per-IP rate limiting and Prometheus metrics
//! - Retention sweep for finished jobs

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod reaper;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use reaper::JobReaper;
pub use routes::create_router;
pub use state::{AppState, FrameSourceFactory, JobEntry};
