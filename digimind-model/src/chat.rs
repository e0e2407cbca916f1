//! Persona chat over an explicit conversation history.

use std::sync::Arc;
use std::time::Duration;

use digimind_core::fallback::UNAVAILABLE_MESSAGE;
use digimind_core::{
    ChatModel, GenerationRequest, Message, ModelError, RetryPolicy, Retryable, fallback_message,
};
use tracing::{info, warn};

/// Default chat model, shared by the persona chat and the OpenAI-compatible client.
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default system prompt.
pub const DEFAULT_PERSONA: &str = "You are a helpful and friendly human-like assistant. \
Respond in a natural, conversational tone, like a real person, and avoid mentioning that you are a language model. \
Be talkative and give specific details from the conversation. \
If you do not know the answer to a question, say truthfully that you do not know.";

/// A conversational front-end that answers one user turn at a time.
///
/// The assistant holds no memory of its own: the caller passes the prior
/// turns in with every call.
pub struct ChatAssistant {
    model: Arc<dyn ChatModel>,
    model_id: String,
    persona: String,
    temperature: f32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ChatAssistant {
    /// Create an assistant with the default persona, model and temperature (0.7).
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            model_id: DEFAULT_CHAT_MODEL.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Use a different model identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Replace the system prompt.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Set the sampling temperature, clamped to `0.0..=1.0`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
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

    /// Build the request for `user_input` following `history`.
    pub fn build_request(&self, history: &[Message], user_input: &str) -> GenerationRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.persona.clone()));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(user_input));
        GenerationRequest::new(self.model_id.clone(), messages)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout)
    }

    /// Answer `user_input`. Never fails: errors become readable messages.
    pub async fn respond(&self, history: &[Message], user_input: &str) -> String {
        let request = self.build_request(history, user_input);
        match self.retry.execute(|| self.model.generate(request.clone())).await {
            Ok(text) => {
                info!(model = %self.model_id, history_len = history.len(), "chat reply generated");
                text
            }
            Err(e) => {
                warn!(model = %self.model_id, error = %e, "chat generation failed");
                describe_failure(&e)
            }
        }
    }
}

fn describe_failure(err: &ModelError) -> String {
    match err {
        ModelError::NotFound(_) => UNAVAILABLE_MESSAGE.to_string(),
        e if e.is_transient() => fallback_message(e),
        e => format!("Error processing your request: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use digimind_core::Role;

    use super::*;
    use crate::mock::MockModel;

    #[test]
    fn request_starts_with_persona_and_ends_with_input() {
        let assistant = ChatAssistant::new(Arc::new(MockModel::new("mock"))).with_temperature(1.5);
        let history = vec![Message::user("hi"), Message::assistant("hello!")];
        let request = assistant.build_request(&history, "how are you?");

        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[3].text(), "how are you?");
        assert_eq!(request.temperature, Some(1.0));
        assert_eq!(request.model, DEFAULT_CHAT_MODEL);
    }

    #[tokio::test]
    async fn returns_model_text() {
        let model = Arc::new(MockModel::new("mock").with_response("I'm great"));
        let assistant = ChatAssistant::new(model.clone());
        assert_eq!(assistant.respond(&[], "how are you?").await, "I'm great");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_model_reports_unavailable() {
        let model = Arc::new(MockModel::new("mock").with_error(ModelError::NotFound("llama".into())));
        let assistant = ChatAssistant::new(model.clone());
        assert_eq!(assistant.respond(&[], "hi").await, UNAVAILABLE_MESSAGE);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_then_reported() {
        let model = Arc::new(
            MockModel::new("mock")
                .with_error(ModelError::Timeout)
                .with_error(ModelError::Timeout)
                .with_error(ModelError::Timeout),
        );
        let assistant = ChatAssistant::new(model.clone());
        let reply = assistant.respond(&[], "hi").await;
        assert_eq!(reply, digimind_core::fallback::TIMEOUT_MESSAGE);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn other_errors_are_described() {
        let model = Arc::new(MockModel::new("mock").with_error(ModelError::Request("refused".into())));
        let reply = ChatAssistant::new(model).respond(&[], "hi").await;
        assert_eq!(reply, "Error processing your request: request failed: refused");
    }

    #[cfg(feature = "openai")]
    #[test]
    fn persona_and_client_default_to_the_same_model() {
        let request = ChatAssistant::new(Arc::new(MockModel::new("mock"))).build_request(&[], "hi");
        assert_eq!(request.model, crate::openai::OpenAICompatibleConfig::groq("key").model);
        assert_eq!(crate::openai::DEFAULT_CHAT_MODEL, crate::DEFAULT_CHAT_MODEL);
    }
}
