//! OpenAI-compatible client implementation.

use async_trait::async_trait;
use digimind_core::{ChatModel, GenerationRequest, Message, ModelError, Part, Result};
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::config::OpenAICompatibleConfig;
use crate::speech::{AudioClip, SpeechToText};

/// Client for Groq and other OpenAI-compatible APIs.
///
/// One call is one HTTP request. Timeouts surface as [`ModelError::Timeout`]
/// so that callers can retry them.
pub struct OpenAICompatibleClient {
    http: reqwest::Client,
    config: OpenAICompatibleConfig,
}

impl OpenAICompatibleClient {
    /// Create a client. Fails if the API key is empty.
    pub fn new(config: OpenAICompatibleConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ModelError::Config("API key must not be empty".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Return the client configuration.
    pub fn config(&self) -> &OpenAICompatibleConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url)
    }
}

// ── OpenAI wire types ──────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(String),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl<'a> },
}

#[derive(Serialize)]
struct WireImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn to_wire(message: &Message) -> WireMessage<'_> {
    let content = if message.is_text_only() {
        WireContent::Text(message.text())
    } else {
        WireContent::Parts(
            message
                .parts
                .iter()
                .map(|part| match part {
                    Part::Text { text } => WirePart::Text { text },
                    Part::ImageUrl { url } => WirePart::ImageUrl { image_url: WireImageUrl { url } },
                })
                .collect(),
        )
    };
    WireMessage { role: message.role.as_str(), content }
}

fn send_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Request(e.to_string())
    }
}

/// Turn a non-success response into the matching [`ModelError`].
async fn status_error(response: reqwest::Response) -> ModelError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(%status, detail = %detail, "API error");
    ModelError::from_status(status.as_u16(), detail)
}

// ── ChatModel implementation ───────────────────────────────────────

#[async_trait]
impl ChatModel for OpenAICompatibleClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let model = if request.model.is_empty() { self.config.model.as_str() } else { &request.model };
        debug!(model, message_count = request.messages.len(), timeout = ?request.timeout, "chat completion");

        let body = ChatCompletionRequest {
            model,
            messages: request.messages.iter().map(to_wire).collect(),
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                ModelError::InvalidResponse(format!("failed to parse response: {e}"))
            }
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::InvalidResponse("response contained no message content".into()))
    }
}

// ── SpeechToText implementation ────────────────────────────────────

#[async_trait]
impl SpeechToText for OpenAICompatibleClient {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        debug!(file = %clip.file_name(), bytes = clip.data().len(), "transcribing audio");

        let file = multipart::Part::bytes(clip.data().to_vec())
            .file_name(clip.file_name().to_string())
            .mime_str(clip.mime_type())
            .map_err(|e| ModelError::Config(format!("invalid audio MIME type: {e}")))?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("model", self.config.transcription_model.clone());

        let response = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(send_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let transcription: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("failed to parse transcription: {e}")))?;
        Ok(transcription.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_rejected() {
        let result = OpenAICompatibleClient::new(OpenAICompatibleConfig::groq(""));
        assert!(matches!(result, Err(ModelError::Config(_))));
    }

    #[test]
    fn text_messages_serialize_as_plain_strings() {
        let json = serde_json::to_value(to_wire(&Message::user("hello"))).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn image_messages_serialize_as_parts() {
        let message = Message::user("what is this?").with_image_url("data:image/png;base64,AAAA");
        let json = serde_json::to_value(to_wire(&message)).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "what is this?");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
