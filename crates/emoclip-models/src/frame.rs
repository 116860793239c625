//! Sampled frame payloads.

/// An encoded still image taken from the video at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    /// Encoded image bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`, e.g. `image/jpeg`
    pub mime_type: &'static str,
}

impl FrameImage {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg",
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}
