//! Scripted model for tests and offline demos.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use digimind_core::{ChatModel, GenerationRequest, ModelError, Result};

/// A [`ChatModel`] that replays scripted outcomes in order.
///
/// Every request is recorded. When the script runs out the model answers
/// with the default response if one was set, otherwise with
/// [`ModelError::InvalidResponse`].
///
/// # Example
///
/// ```rust,ignore
/// let model = MockModel::new("mock")
///     .with_error(ModelError::Timeout)
///     .with_response("hello");
/// ```
#[derive(Debug, Default)]
pub struct MockModel {
    name: String,
    script: Mutex<VecDeque<Result<String>>>,
    default_response: Option<String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockModel {
    /// Create a mock with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Queue a successful response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: ModelError) -> Self {
        self.push(Err(error));
        self
    }

    /// Answer with `text` once the script is exhausted.
    pub fn with_default_response(mut self, text: impl Into<String>) -> Self {
        self.default_response = Some(text.into());
        self
    }

    /// All requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push(&self, outcome: Result<String>) {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(outcome);
    }
}

#[async_trait]
impl ChatModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);
        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(outcome) => outcome,
            None => self
                .default_response
                .clone()
                .ok_or_else(|| ModelError::InvalidResponse("mock script exhausted".into())),
        }
    }
}
