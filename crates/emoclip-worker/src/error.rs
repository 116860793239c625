//! Worker error types.

use thiserror::Error;

use emoclip_media::MediaError;
use emoclip_ml_client::MlError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkerError::Cancelled | WorkerError::Media(MediaError::Cancelled)
        )
    }

    /// Caller mistakes, as opposed to environment failures.
    pub fn is_input_error(&self) -> bool {
        match self {
            WorkerError::InvalidRequest(_) => true,
            WorkerError::Media(e) => e.is_input_error(),
            _ => false,
        }
    }

    /// Message shown on the failed job.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::Cancelled | WorkerError::Media(MediaError::Cancelled) => {
                "cancelled".to_string()
            }
            WorkerError::Media(MediaError::InvalidVideo(msg)) => {
                format!("Could not read the video: {}", msg)
            }
            WorkerError::Media(MediaError::FfmpegNotFound | MediaError::FfprobeNotFound) => {
                "Video tooling is not installed on the server".to_string()
            }
            WorkerError::Classifier(MlError::MissingCredentials(_))
            | WorkerError::Classifier(MlError::Unauthorized(_)) => {
                "Emotion classifier is not configured correctly".to_string()
            }
            other => other.to_string(),
        }
    }
}
