//! Per-frame emotion classifiers.
//!
//! Two backends implement [`FrameClassifier`]:
//! - [`MlClient`] talks to the Python DeepFace service (`/detect-emotions`).
//! - [`GatewayClassifier`] asks a hosted vision model through an
//!   OpenAI-compatible chat completions gateway.
//!
//! `CLASSIFIER_BACKEND` picks one at startup via [`classifier_from_env`].

pub mod classifier;
pub mod client;
pub mod error;
pub mod gateway;
pub mod types;

pub use classifier::{classifier_from_env, ClassifierBackend, FrameClassifier};
pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use gateway::{GatewayClassifier, GatewayConfig};
pub use types::{EmotionRequest, EmotionResponse, EmotionResult, GatewayVerdict};
