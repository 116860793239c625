//! Detection request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Emotion;

/// The emotions a detection run should look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionRequest {
    pub emotions: Vec<Emotion>,
}

impl DetectionRequest {
    pub fn new(emotions: Vec<Emotion>) -> Self {
        Self { emotions }
    }

    /// Parse a comma-separated emotion list and validate it.
    pub fn parse(list: &str) -> Result<Self, String> {
        let emotions = Emotion::parse_list(list).map_err(|e| e.to_string())?;
        let request = Self::new(emotions);
        request.validate()?;
        Ok(request)
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.emotions.is_empty() {
            return Err("At least one emotion must be selected".to_string());
        }

        for (i, emotion) in self.emotions.iter().enumerate() {
            if self.emotions[..i].contains(emotion) {
                return Err(format!("Emotion {} selected more than once", emotion));
            }
        }

        Ok(())
    }
}
