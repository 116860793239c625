//! Classifier abstraction and backend selection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use emoclip_models::{Detection, Emotion, FrameImage};

use crate::client::{MlClient, MlClientConfig};
use crate::error::{MlError, MlResult};
use crate::gateway::{GatewayClassifier, GatewayConfig};

/// Scores one frame against a set of emotions.
///
/// Implementations may omit emotions they consider below their own floor.
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Classify a single frame.
    async fn classify(&self, frame: &FrameImage, emotions: &[Emotion]) -> MlResult<Vec<Detection>>;

    /// Whether the backend is reachable and ready.
    async fn health_check(&self) -> MlResult<bool>;
}

/// Which classifier backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierBackend {
    /// Python DeepFace service
    #[default]
    MlService,
    /// OpenAI-compatible vision gateway
    Gateway,
}

impl ClassifierBackend {
    pub fn parse(s: &str) -> MlResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "ml_service" | "ml-service" | "deepface" => Ok(Self::MlService),
            "gateway" | "llm" => Ok(Self::Gateway),
            other => Err(MlError::Config(format!("Unknown classifier backend: {}", other))),
        }
    }

    /// Read `CLASSIFIER_BACKEND`, defaulting to the ML service.
    pub fn from_env() -> MlResult<Self> {
        match std::env::var("CLASSIFIER_BACKEND") {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Ok(Self::default()),
        }
    }
}

/// Build the classifier selected by the environment.
pub fn classifier_from_env() -> MlResult<Arc<dyn FrameClassifier>> {
    let backend = ClassifierBackend::from_env()?;
    let classifier: Arc<dyn FrameClassifier> = match backend {
        ClassifierBackend::MlService => Arc::new(MlClient::new(MlClientConfig::from_env())?),
        ClassifierBackend::Gateway => Arc::new(GatewayClassifier::new(GatewayConfig::from_env())?),
    };
    info!("Using {} classifier", classifier.name());
    Ok(classifier)
}

/// Map a non-success HTTP status to a typed error.
pub(crate) fn status_error(status: StatusCode, body: &str) -> MlError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => MlError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => MlError::QuotaExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            MlError::Unauthorized(format!("{}", status))
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            MlError::ServiceUnavailable(format!("{}", status))
        }
        _ => MlError::RequestFailed(format!("Classifier returned {}: {}", status, body)),
    }
}

/// Map a transport error, keeping timeouts distinguishable.
pub(crate) fn send_error(err: reqwest::Error, timeout: Duration) -> MlError {
    if err.is_timeout() {
        MlError::Timeout(timeout.as_secs())
    } else {
        MlError::Network(err)
    }
}

/// Execute with retry logic.
///
/// Retryable errors back off for `500ms * 2^attempt`.
pub(crate) async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> MlResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = MlResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                warn!(
                    "Classifier request failed (attempt {}), retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backend_parse() {
        assert_eq!(
            ClassifierBackend::parse("ML_SERVICE").unwrap(),
            ClassifierBackend::MlService
        );
        assert_eq!(
            ClassifierBackend::parse("gateway").unwrap(),
            ClassifierBackend::Gateway
        );
        assert!(ClassifierBackend::parse("tarot").is_err());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            MlError::RateLimited
        ));
        assert!(matches!(
            status_error(StatusCode::PAYMENT_REQUIRED, ""),
            MlError::QuotaExceeded
        ));
        assert!(status_error(StatusCode::FORBIDDEN, "").is_fatal());
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            MlError::RequestFailed(msg) if msg.contains("boom")
        ));
    }

    #[tokio::test]
    async fn test_with_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: MlResult<()> = with_retry(1, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(MlError::ServiceUnavailable("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_with_retry_skips_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: MlResult<()> = with_retry(5, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(MlError::QuotaExceeded)
        })
        .await;

        assert!(matches!(result, Err(MlError::QuotaExceeded)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
