//! ML service request/response types.

use serde::{Deserialize, Serialize};

use emoclip_models::{Detection, Emotion};

use crate::error::{MlError, MlResult};

/// Request for per-frame emotion detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionRequest {
    /// Base64-encoded image bytes
    pub image_base64: String,
    /// Emotion codes the caller is interested in
    pub target_emotions: Vec<Emotion>,
}

/// One scored emotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionResult {
    /// Emotion label, either our code or a DeepFace label
    pub emotion: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

/// Response from emotion detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionResponse {
    #[serde(default)]
    pub emotions: Vec<EmotionResult>,
    #[serde(default)]
    pub faces_detected: u32,
}

impl EmotionResponse {
    /// Convert to detections restricted to `requested`.
    ///
    /// Unknown labels, out-of-range confidences and repeated emotions mean
    /// the service is not speaking our protocol and are rejected.
    pub fn into_detections(self, requested: &[Emotion]) -> MlResult<Vec<Detection>> {
        let mut detections: Vec<Detection> = Vec::with_capacity(self.emotions.len());

        for result in self.emotions {
            let emotion = Emotion::from_label(&result.emotion)
                .map_err(|e| MlError::InvalidResponse(e.to_string()))?;

            if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
                return Err(MlError::InvalidResponse(format!(
                    "Confidence for {} out of range: {}",
                    emotion, result.confidence
                )));
            }
            if detections.iter().any(|d| d.emotion == emotion) {
                return Err(MlError::InvalidResponse(format!(
                    "Emotion {} reported more than once",
                    emotion
                )));
            }
            if requested.contains(&emotion) {
                detections.push(Detection::new(emotion, result.confidence));
            }
        }

        Ok(detections)
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: Option<String>,
    #[serde(default)]
    pub supported_emotions: Vec<String>,
}

/// Verdict requested from the vision gateway model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayVerdict {
    pub emotion: String,
    pub confidence: f64,
    #[serde(default)]
    pub detected: bool,
}

impl GatewayVerdict {
    /// Answer used when the model reply cannot be understood.
    pub fn undetected() -> Self {
        Self {
            emotion: Emotion::Neutral.as_str().to_string(),
            confidence: 0.5,
            detected: false,
        }
    }

    /// At most one detection, and only for a requested emotion.
    ///
    /// A reply that parsed but names an unknown emotion or a confidence
    /// outside `[0, 1]` is rejected rather than coerced.
    pub fn into_detections(self, requested: &[Emotion]) -> MlResult<Vec<Detection>> {
        let emotion = Emotion::from_label(&self.emotion)
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(MlError::InvalidResponse(format!(
                "Confidence for {} out of range: {}",
                emotion, self.confidence
            )));
        }

        if self.detected && requested.contains(&emotion) {
            Ok(vec![Detection::new(emotion, self.confidence)])
        } else {
            Ok(Vec::new())
        }
    }
}

// Chat completions wire format (OpenAI compatible)

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatReply {
    #[serde(default)]
    pub content: Option<String>,
}
