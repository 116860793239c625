//! Vision-model classifier behind an OpenAI-compatible chat completions gateway.
//!
//! The model is asked for the single dominant emotion in the frame and
//! answers with `{"emotion": .., "confidence": .., "detected": ..}`.

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
use crate::types::{
    ChatContent, ChatMessage, ChatRequest, ChatResponse, ContentPart, GatewayVerdict, ImageUrl,
};

pub const DEFAULT_GATEWAY_MODEL: &str = "google/gemini-2.5-flash";

const SYSTEM_PROMPT: &str = r#"You are an expert emotion detection AI. Analyze video frames to detect human emotions.

Identify the dominant emotion visible in the image and provide a confidence score.

The emotions you can detect are:
- joy: happiness, smiling, laughter
- sadness: frowning, tears, downcast expression
- anger: furrowed brows, tense expression, aggressive posture
- fear: wide eyes, tense body, cowering
- surprise: raised eyebrows, open mouth, wide eyes
- disgust: nose wrinkle, lip curl, aversion expression
- neutral: calm, relaxed, no strong emotion

Respond ONLY with a JSON object in this exact format (no markdown, no explanation):
{"emotion": "emotion_name", "confidence": 0.85, "detected": true}

If no clear human face or emotion is visible, respond with:
{"emotion": "neutral", "confidence": 0.5, "detected": false}"#;

/// Configuration for the gateway classifier.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Chat completions endpoint
    pub url: String,
    pub model: String,
    /// Bearer token
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "https://ai.gateway.lovable.dev/v1/chat/completions".to_string(),
            model: DEFAULT_GATEWAY_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 0,
            max_tokens: 100,
        }
    }
}

impl GatewayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("GATEWAY_URL").unwrap_or(defaults.url),
            model: std::env::var("GATEWAY_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("GATEWAY_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            timeout: Duration::from_secs(
                std::env::var("GATEWAY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_retries: std::env::var("GATEWAY_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            max_tokens: defaults.max_tokens,
        }
    }
}

/// Classifier that asks a hosted vision model.
pub struct GatewayClassifier {
    http: Client,
    url: Url,
    api_key: String,
    config: GatewayConfig,
}

impl GatewayClassifier {
    /// Fails with [`MlError::MissingCredentials`] when no API key is set.
    pub fn new(config: GatewayConfig) -> MlResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(MlError::MissingCredentials("GATEWAY_API_KEY"))?;
        let url = Url::parse(&config.url)
            .map_err(|e| MlError::Config(format!("GATEWAY_URL {}: {}", config.url, e)))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self {
            http,
            url,
            api_key,
            config,
        })
    }

    fn build_request(&self, frame: &FrameImage, emotions: &[Emotion]) -> ChatRequest<'_> {
        let wanted = emotions
            .iter()
            .map(|e| e.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let data_url = format!("data:{};base64,{}", frame.mime_type, BASE64.encode(&frame.bytes));

        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: ChatContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: ChatContent::Parts(vec![
                        ContentPart::Text {
                            text: format!(
                                "Analyze this video frame and detect the dominant emotion. \
                                 I'm specifically looking for \"{}\", but report the actual \
                                 emotion you detect.",
                                wanted
                            ),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl { url: data_url },
                        },
                    ]),
                },
            ],
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Parse the model's reply, tolerating markdown code fences.
///
/// Anything unparseable is reported as nothing detected.
pub fn parse_verdict(content: &str) -> GatewayVerdict {
    let cleaned = strip_code_fences(content);
    match serde_json::from_str::<GatewayVerdict>(cleaned) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!("Failed to parse gateway reply ({}): {:?}", e, content);
            GatewayVerdict::undetected()
        }
    }
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
impl FrameClassifier for GatewayClassifier {
    fn name(&self) -> &'static str {
        "gateway"
    }

    async fn classify(&self, frame: &FrameImage, emotions: &[Emotion]) -> MlResult<Vec<Detection>> {
        if frame.is_empty() {
            return Err(MlError::RequestFailed("Empty frame".to_string()));
        }

        let request = self.build_request(frame, emotions);
        let body = with_retry(self.config.max_retries, || async {
            let response = self
                .http
                .post(self.url.clone())
                .bearer_auth(&self.api_key)
                .json(&request)
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

        let chat: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| MlError::InvalidResponse(format!("Unexpected gateway payload: {}", e)))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!("Gateway reply: {}", content);

        parse_verdict(&content).into_detections(emotions)
    }

    /// The gateway has no health endpoint; a configured key is all we can check.
    async fn health_check(&self) -> MlResult<bool> {
        Ok(!self.api_key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_fatal() {
        let result = GatewayClassifier::new(GatewayConfig::default());
        assert!(matches!(
            result,
            Err(MlError::MissingCredentials("GATEWAY_API_KEY"))
        ));
    }

    #[test]
    fn test_parse_verdict_with_fences() {
        let verdict = parse_verdict(
            "```json\n{\"emotion\": \"joy\", \"confidence\": 0.91, \"detected\": true}\n```",
        );
        assert_eq!(verdict.emotion, "joy");
        assert!(verdict.detected);
        assert!((verdict.confidence - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_parse_verdict_garbage() {
        let verdict = parse_verdict("I think they look happy!");
        assert!(!verdict.detected);
        assert_eq!(verdict.emotion, "neutral");
    }

    #[test]
    fn test_request_embeds_data_url() {
        let config = GatewayConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        let classifier = GatewayClassifier::new(config).unwrap();
        let frame = FrameImage::jpeg(vec![1, 2, 3]);
        let request = classifier.build_request(&frame, &[Emotion::Fear, Emotion::Joy]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_GATEWAY_MODEL);
        let parts = &json["messages"][1]["content"];
        assert!(parts[0]["text"].as_str().unwrap().contains("fear, joy"));
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,AQID");
    }
}
