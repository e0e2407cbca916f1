//! Embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! This module is only available when the `openai` feature is enabled. The
//! defaults target a self-hosted server (for example a text-embeddings
//! inference container) serving `all-MiniLM-L6-v2`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenAI-compatible";

/// Default API root for embeddings.
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:8080/v1";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Dimensionality of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Settings for [`OpenAIEmbeddingProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIEmbeddingConfig {
    /// Bearer token. Local servers usually need none.
    pub api_key: Option<String>,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Expected vector length.
    pub dimensions: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OpenAIEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAIEmbeddingConfig {
    /// Read `EMBEDDING_API_KEY`, `EMBEDDING_BASE_URL` and `EMBEDDING_MODEL`,
    /// keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Ok(base_url) = std::env::var("EMBEDDING_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.model = model;
        }
        config
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Point the provider at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model name and its output dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Example
///
/// ```rust,ignore
/// use digimind_rag::openai::{OpenAIEmbeddingConfig, OpenAIEmbeddingProvider};
///
/// let provider = OpenAIEmbeddingProvider::new(OpenAIEmbeddingConfig::from_env())?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    config: OpenAIEmbeddingConfig,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `dimensions` is zero or the
    /// HTTP client cannot be built.
    pub fn new(config: OpenAIEmbeddingConfig) -> Result<Self> {
        if config.dimensions == 0 {
            return Err(RagError::Configuration("embedding dimensions must be greater than zero".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Return the provider configuration.
    pub fn config(&self) -> &OpenAIEmbeddingConfig {
        &self.config
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::embedding(PROVIDER, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.config.model, "embedding batch");

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .timeout(self.config.timeout)
            .json(&EmbeddingRequest { model: &self.config.model, input: texts });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("request failed: {e}"),
                transient: e.is_timeout(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::Embedding {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
                transient: transient_status(status),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::embedding(
                PROVIDER,
                format!("expected {} embeddings, got {}", texts.len(), parsed.data.len()),
            ));
        }
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        let expected = self.config.dimensions;
        if let Some(bad) = parsed.data.iter().find(|d| d.embedding.len() != expected) {
            return Err(RagError::Configuration(format!(
                "model '{}' returned {}-dimensional vectors, expected {expected}",
                self.config.model,
                bad.embedding.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}
