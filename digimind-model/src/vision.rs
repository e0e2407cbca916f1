//! Questions about an uploaded image.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use digimind_core::{ChatModel, GenerationRequest, Message, ModelError, RetryPolicy, fallback_message};
use tracing::{info, warn};

/// Default vision-capable model.
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// An image ready to be sent inline as a base64 `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    mime_type: &'static str,
    data: Vec<u8>,
}

impl ImageInput {
    /// Wrap raw image bytes, detecting the format from its magic number.
    ///
    /// Unknown formats are sent as JPEG. Empty input is rejected.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ModelError> {
        if data.is_empty() {
            return Err(ModelError::Config("image is empty".into()));
        }
        Ok(Self { mime_type: sniff_mime_type(&data), data })
    }

    /// The detected MIME type.
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// The raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The image as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

fn sniff_mime_type(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

/// Answers questions about images with a vision model.
pub struct ImageAnalyzer {
    model: Arc<dyn ChatModel>,
    model_id: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ImageAnalyzer {
    /// Create an analyzer with the default vision model and a 25 second timeout.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            model_id: DEFAULT_VISION_MODEL.to_string(),
            timeout: Duration::from_secs(25),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a different model identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the single-message request for `question` about `image`.
    pub fn build_request(&self, image: &ImageInput, question: &str) -> GenerationRequest {
        let message = Message::user(question).with_image_url(image.data_url());
        GenerationRequest::new(self.model_id.clone(), vec![message]).with_timeout(self.timeout)
    }

    /// Ask `question` about `image`. Never fails: errors become readable messages.
    pub async fn analyze(&self, image: &ImageInput, question: &str) -> String {
        let request = self.build_request(image, question);
        match self.retry.execute(|| self.model.generate(request.clone())).await {
            Ok(text) => {
                info!(model = %self.model_id, mime = image.mime_type(), "image analyzed");
                text
            }
            Err(e) => {
                warn!(model = %self.model_id, error = %e, "image analysis failed");
                match e {
                    ModelError::Request(_) | ModelError::InvalidResponse(_) | ModelError::Config(_) => {
                        format!("Error analyzing image: {e}")
                    }
                    other => fallback_message(&other),
                }
            }
        }
    }
}
