//! Context-grounded question answering.
//!
//! [`RetrievalAnswerer::answer`] walks a fixed sequence of steps, each in its
//! own tracing span under `rag.answer`:
//!
//! 1. `rag.embed_query`: embed the question
//! 2. `rag.retrieve`: fetch the top-k chunks (similarity or MMR)
//! 3. `rag.compose_prompt`: join chunk texts and the question into one prompt
//! 4. `rag.generate`: call the chat model under the retry policy
//!
//! Embedding and retrieval failures are returned as errors. Generation
//! failures never are: once retries are exhausted the caller receives a
//! readable fallback message instead.

use std::sync::Arc;
use std::time::Duration;

use digimind_core::{ChatModel, GenerationRequest, Message, RetryPolicy, fallback_message};
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::config::{RagConfig, SearchMode};
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;

/// Default model for grounded answers.
pub const DEFAULT_ANSWER_MODEL: &str = "llama-3.3-70b-versatile";

/// Separator between retrieved chunks in the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Build the grounding prompt from retrieved chunks, in retrieval order.
pub fn compose_prompt(query: &str, context: &[SearchResult]) -> String {
    let context = context.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    format!(
        "You are a helpful assistant. Use the following context to answer the user's question.\n\n\
         Context:\n{context}\n\nQuestion: {query}\nAnswer:"
    )
}

/// The full result of one grounded answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Text to show the user: the model's answer or a fallback message.
    pub text: String,
    /// The chunks the prompt was grounded on, in retrieval order.
    pub sources: Vec<SearchResult>,
    /// `false` when `text` is a fallback message.
    pub generated: bool,
}

/// Answers questions from a vector index and a chat model.
///
/// Holds no per-query state: the index is passed into every call.
///
/// # Example
///
/// ```rust,ignore
/// use digimind_rag::{FlatIndex, RetrievalAnswerer};
///
/// let index = FlatIndex::load_or_empty("digimind_index").await?;
/// let answerer = RetrievalAnswerer::new(embedder, model).with_config(&config);
/// let text = answerer.answer("What colour is the sky?", &index, config.top_k).await?;
/// ```
pub struct RetrievalAnswerer {
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
    model_id: String,
    temperature: Option<f32>,
    timeout: Duration,
    retry: RetryPolicy,
    search_mode: SearchMode,
    similarity_threshold: Option<f32>,
}

impl RetrievalAnswerer {
    /// Create an answerer with the default model, a 30 second timeout,
    /// the default retry policy and MMR retrieval.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            embedder,
            model,
            model_id: DEFAULT_ANSWER_MODEL.to_string(),
            temperature: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            search_mode: SearchMode::default(),
            similarity_threshold: None,
        }
    }

    /// Take the retrieval settings from a [`RagConfig`].
    pub fn with_config(mut self, config: &RagConfig) -> Self {
        self.search_mode = config.search_mode;
        self.similarity_threshold = config.similarity_threshold;
        self
    }

    /// Use a different model identifier.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the sampling temperature. Unset leaves the provider default.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the per-attempt generation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy for embedding and generation calls.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the retrieval strategy.
    pub fn with_search_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    /// Answer `query` from the `k` most relevant chunks of `index`.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidArgument`] if `k == 0`.
    /// - Whatever the embedder returned if the query could not be embedded.
    /// - [`RagError::Configuration`] if the query vector does not match the index.
    pub async fn answer(&self, query: &str, index: &dyn VectorIndex, k: usize) -> Result<String> {
        self.answer_detailed(query, index, k).await.map(|answer| answer.text)
    }

    /// Like [`answer`](Self::answer), but also returns the retrieved chunks.
    pub async fn answer_detailed(&self, query: &str, index: &dyn VectorIndex, k: usize) -> Result<Answer> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".into()));
        }
        let span = info_span!("rag.answer", query.id = %Uuid::new_v4(), k, model = %self.model_id);
        self.run(query, index, k).instrument(span).await
    }

    async fn run(&self, query: &str, index: &dyn VectorIndex, k: usize) -> Result<Answer> {
        let query_vector = self
            .retry
            .execute(|| self.embedder.embed(query))
            .instrument(info_span!("rag.embed_query"))
            .await
            .inspect_err(|e| error!(error = %e, "query embedding failed"))?;

        let sources = info_span!("rag.retrieve").in_scope(|| self.retrieve(index, &query_vector, k))?;

        let prompt = info_span!("rag.compose_prompt").in_scope(|| {
            let prompt = compose_prompt(query, &sources);
            debug!(context_chunks = sources.len(), prompt_chars = prompt.chars().count(), "prompt composed");
            prompt
        });

        let (text, generated) = self.generate(prompt).instrument(info_span!("rag.generate")).await;
        Ok(Answer { text, sources, generated })
    }

    fn retrieve(&self, index: &dyn VectorIndex, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let results = match self.search_mode {
            SearchMode::Similarity => index.search(query_vector, k)?,
            SearchMode::Mmr { lambda, fetch_multiplier } => {
                index.search_mmr(query_vector, k, lambda, k.saturating_mul(fetch_multiplier))?
            }
        };
        let results: Vec<SearchResult> = match self.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };
        info!(result_count = results.len(), index_size = index.len(), "retrieved context");
        Ok(results)
    }

    async fn generate(&self, prompt: String) -> (String, bool) {
        let mut request =
            GenerationRequest::new(self.model_id.clone(), vec![Message::user(prompt)]).with_timeout(self.timeout);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        match self.retry.execute(|| self.model.generate(request.clone())).await {
            Ok(text) => (text, true),
            Err(e) => {
                error!(error = %e, "generation failed");
                (fallback_message(&e), false)
            }
        }
    }
}
