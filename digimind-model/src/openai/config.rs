//! Configuration for OpenAI-compatible endpoints.

use std::time::Duration;

use digimind_core::ModelError;

use crate::chat::DEFAULT_CHAT_MODEL;

/// Groq's OpenAI-compatible API root.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default speech-to-text model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Connection settings for an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    /// Bearer token.
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Model used when a request leaves its model empty.
    pub model: String,
    /// Model used for audio transcription.
    pub transcription_model: String,
    /// Timeout for transcription uploads. Chat requests carry their own.
    pub timeout: Duration,
}

impl OpenAICompatibleConfig {
    /// Create a config for Groq with an explicit model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GROQ_API_BASE.to_string(),
            model: model.into(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Create a config for Groq with the default chat model.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_CHAT_MODEL)
    }

    /// Build a config from `GROQ_API_KEY`, plus optional `GROQ_BASE_URL` and `GROQ_MODEL`.
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ModelError::Config("GROQ_API_KEY environment variable not set".into()))?;
        let mut config = Self::groq(api_key);
        if let Ok(base_url) = std::env::var("GROQ_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(model) = std::env::var("GROQ_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the transcription model.
    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    /// Set the transcription timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
