//! ML service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use emoclip_models::{Detection, Emotion, FrameImage};

use crate::classifier::{send_error, status_error, with_retry, FrameClassifier};
use crate::error::{MlError, MlResult};
use crate::types::{EmotionRequest, EmotionResponse, HealthResponse};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ML_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the Python DeepFace service.
pub struct MlClient {
    http: Client,
    base_url: Url,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| MlError::Config(format!("ML_SERVICE_URL {}: {}", config.base_url, e)))?;
        // Keep any path prefix when joining endpoints
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> MlResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MlError::Config(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// Score one frame.
    pub async fn detect_emotions(&self, request: &EmotionRequest) -> MlResult<EmotionResponse> {
        let url = self.endpoint("detect-emotions")?;

        debug!(
            "Sending emotion detection request to {} ({} target emotions)",
            url,
            request.target_emotions.len()
        );

        let body = with_retry(self.config.max_retries, || async {
            let response = self
                .http
                .post(url.clone())
                .json(request)
                .send()
                .await
                .map_err(|e| send_error(e, self.config.timeout))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| send_error(e, self.config.timeout))?;
            if !status.is_success() {
                return Err(status_error(status, &text));
            }
            Ok(text)
        })
        .await?;

        serde_json::from_str(&body).map_err(|e| {
            MlError::InvalidResponse(format!("Unexpected detect-emotions payload: {}", e))
        })
    }
}

#[async_trait]
impl FrameClassifier for MlClient {
    fn name(&self) -> &'static str {
        "ml_service"
    }

    async fn classify(&self, frame: &FrameImage, emotions: &[Emotion]) -> MlResult<Vec<Detection>> {
        if frame.is_empty() {
            return Err(MlError::RequestFailed("Empty frame".to_string()));
        }

        let request = EmotionRequest {
            image_base64: BASE64.encode(&frame.bytes),
            target_emotions: emotions.to_vec(),
        };
        let response = self.detect_emotions(&request).await?;
        if response.faces_detected == 0 {
            debug!("No faces detected in frame");
        }
        response.into_detections(emotions)
    }

    /// Check if ML service is healthy.
    async fn health_check(&self) -> MlResult<bool> {
        let url = self.endpoint("health")?;

        match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }
}
