//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Usage quota exceeded")]
    QuotaExceeded,

    #[error("Classifier rejected credentials: {0}")]
    Unauthorized(String),

    #[error("{0} is not configured")]
    MissingCredentials(&'static str),

    #[error("Invalid classifier configuration: {0}")]
    Config(String),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MlError::ServiceUnavailable(_)
                | MlError::Timeout(_)
                | MlError::Network(_)
                | MlError::RateLimited
        )
    }

    /// Errors that make every further call pointless, so the run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MlError::MissingCredentials(_)
                | MlError::Unauthorized(_)
                | MlError::InvalidResponse(_)
                | MlError::Config(_)
        )
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            MlError::ServiceUnavailable(_) => "unavailable",
            MlError::RequestFailed(_) => "request_failed",
            MlError::InvalidResponse(_) | MlError::Json(_) => "invalid_response",
            MlError::Timeout(_) => "timeout",
            MlError::Network(_) => "network",
            MlError::RateLimited => "rate_limited",
            MlError::QuotaExceeded => "quota_exceeded",
            MlError::Unauthorized(_) | MlError::MissingCredentials(_) => "credentials",
            MlError::Config(_) => "config",
        }
    }
}
