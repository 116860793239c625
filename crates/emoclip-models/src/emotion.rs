//! Emotion codes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An emotion the classifier can report.
///
/// The serialized form is the lowercase emotion code (`"joy"`, `"fear"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

/// Error returned when a string is not a recognized emotion code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown emotion: {0}")]
pub struct UnknownEmotion(pub String);

impl Emotion {
    /// Every emotion, in display order.
    pub const ALL: [Emotion; 7] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Neutral,
    ];

    /// Get the emotion code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a classifier label.
    ///
    /// Accepts our codes case-insensitively plus the DeepFace vocabulary
    /// (`angry`, `happy`, `sad`).
    pub fn from_label(label: &str) -> Result<Self, UnknownEmotion> {
        match label.trim().to_ascii_lowercase().as_str() {
            "joy" | "happy" => Ok(Emotion::Joy),
            "sadness" | "sad" => Ok(Emotion::Sadness),
            "anger" | "angry" => Ok(Emotion::Anger),
            "fear" => Ok(Emotion::Fear),
            "surprise" => Ok(Emotion::Surprise),
            "disgust" => Ok(Emotion::Disgust),
            "neutral" => Ok(Emotion::Neutral),
            _ => Err(UnknownEmotion(label.to_string())),
        }
    }

    /// Parse a comma-separated list such as `"joy, fear"`.
    ///
    /// Empty items are skipped; duplicates are kept so callers can reject them.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, UnknownEmotion> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Emotion::from_label)
            .collect()
    }
}

impl FromStr for Emotion {
    type Err = UnknownEmotion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::from_label(s)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
