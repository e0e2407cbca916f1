//! Document ingestion.
//!
//! The [`IngestPipeline`] turns uploaded files into a searchable index:
//! decode → chunk → embed (batched, with retry) → insert, one document at a
//! time, then persists the index. A document that cannot be decoded or
//! embedded is skipped and reported; it never aborts the others. The index
//! is saved only when at least one chunk was added.
//!
//! # Example
//!
//! ```rust,ignore
//! use digimind_rag::{IngestPipeline, RagConfig, RawDocument};
//!
//! let pipeline = IngestPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .build()?;
//!
//! let outcome = pipeline.ingest(&[RawDocument::new("notes.txt", bytes)]).await?;
//! for failure in &outcome.report.failures {
//!     eprintln!("skipped {}: {}", failure.document, failure.error);
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use digimind_core::RetryPolicy;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Document, IndexEntry, RawDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::flat::FlatIndex;
use crate::index::VectorIndex;

/// A document that made it into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedDocument {
    /// Document name.
    pub document: String,
    /// Number of chunks inserted for it.
    pub chunk_count: usize,
}

/// A document that was skipped.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    /// Document name.
    pub document: String,
    /// Why it was skipped.
    pub error: RagError,
}

/// Per-document summary of one ingest run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Documents inserted, in input order.
    pub ingested: Vec<IngestedDocument>,
    /// Documents skipped, in input order.
    pub failures: Vec<DocumentFailure>,
}

impl IngestReport {
    /// Whether every document was ingested.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total chunks inserted.
    pub fn chunk_count(&self) -> usize {
        self.ingested.iter().map(|d| d.chunk_count).sum()
    }

    /// Names of the skipped documents.
    pub fn failed_documents(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.document.as_str()).collect()
    }
}

/// A freshly built index together with its report.
#[derive(Debug)]
pub struct IngestOutcome {
    /// The populated index.
    pub index: FlatIndex,
    /// What happened to each document.
    pub report: IngestReport,
}

/// Builds and extends vector indexes from raw documents.
///
/// Construct one via [`IngestPipeline::builder()`].
pub struct IngestPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    retry: RetryPolicy,
    persist: bool,
}

impl IngestPipeline {
    /// Create a new [`IngestPipelineBuilder`].
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Directory the index is saved to after each ingest.
    pub fn index_dir(&self) -> &PathBuf {
        &self.config.index_dir
    }

    /// Ingest `documents` into a fresh index and persist it.
    ///
    /// # Errors
    ///
    /// Only pipeline-wide problems fail the call:
    ///
    /// - [`RagError::Configuration`] when the provider's vectors disagree
    ///   with the index in dimensionality or embedding model.
    /// - [`RagError::NothingIngested`] when every document failed.
    /// - [`RagError::Persistence`] when the save fails.
    ///
    /// On any error the saved index is left as it was. Per-document
    /// problems otherwise land in the report.
    pub async fn ingest(&self, documents: &[RawDocument]) -> Result<IngestOutcome> {
        let mut index = FlatIndex::new();
        let report = self.ingest_into(&mut index, documents).await?;
        Ok(IngestOutcome { index, report })
    }

    /// Ingest `documents` into an existing index and persist it.
    ///
    /// Chunks are appended after the existing entries; nothing is
    /// deduplicated. If the call fails, `index` is rolled back to its state
    /// before the call. Callers sharing `index` across tasks must hold a write
    /// lock for the whole call (see [`SharedIndex`](crate::SharedIndex)).
    pub async fn ingest_into(&self, index: &mut FlatIndex, documents: &[RawDocument]) -> Result<IngestReport> {
        let span = info_span!("rag.ingest", ingest.id = %Uuid::new_v4(), document_count = documents.len());
        self.run(index, documents).instrument(span).await
    }

    async fn run(&self, index: &mut FlatIndex, documents: &[RawDocument]) -> Result<IngestReport> {
        self.check_compatible(index)?;

        let checkpoint = index.checkpoint();
        let result = self.ingest_all(index, documents).await;
        if result.is_err() {
            index.restore(checkpoint);
        }
        result
    }

    async fn ingest_all(&self, index: &mut FlatIndex, documents: &[RawDocument]) -> Result<IngestReport> {
        if index.is_empty() {
            index.set_embedding_model(Some(self.embedding_provider.model_id().to_string()));
        }

        let mut report = IngestReport::default();
        for raw in documents {
            match self.ingest_one(index, raw).await {
                Ok(chunk_count) => {
                    info!(document.id = %raw.name, chunk_count, "ingested document");
                    report.ingested.push(IngestedDocument { document: raw.name.clone(), chunk_count });
                }
                Err(e @ RagError::Configuration(_)) => {
                    error!(document.id = %raw.name, error = %e, "aborting ingest");
                    return Err(e);
                }
                Err(e) => {
                    warn!(document.id = %raw.name, error = %e, "skipping document");
                    report.failures.push(DocumentFailure { document: raw.name.clone(), error: e });
                }
            }
        }

        if report.ingested.is_empty() && !report.failures.is_empty() {
            error!(failed = report.failures.len(), "no document could be ingested, keeping the saved index");
            return Err(RagError::NothingIngested { failures: report.failures });
        }
        if report.chunk_count() == 0 {
            info!(ingested = report.ingested.len(), "no chunks produced, keeping the saved index");
            return Ok(report);
        }

        if self.persist {
            index.save(&self.config.index_dir).await?;
        }

        info!(
            ingested = report.ingested.len(),
            failed = report.failures.len(),
            chunk_count = report.chunk_count(),
            "ingest finished"
        );
        Ok(report)
    }

    /// Reject a provider whose vectors cannot share a space with the index.
    fn check_compatible(&self, index: &FlatIndex) -> Result<()> {
        let provided = self.embedding_provider.dimensions();
        if let Some(existing) = index.dimensions() {
            if existing != provided {
                return Err(RagError::Configuration(format!(
                    "embedding provider produces {provided}-dimensional vectors but the index holds {existing}"
                )));
            }
        }
        let model = self.embedding_provider.model_id();
        match index.embedding_model() {
            Some(recorded) if !index.is_empty() && recorded != model => Err(RagError::Configuration(format!(
                "index was built with embedding model '{recorded}', not '{model}'"
            ))),
            _ => Ok(()),
        }
    }

    /// Chunk, embed and insert one document, returning its chunk count.
    async fn ingest_one(&self, index: &mut FlatIndex, raw: &RawDocument) -> Result<usize> {
        let document = Document::from_raw(raw)?;
        let chunks = self.chunker.chunk(&document);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let provider = &self.embedding_provider;
        let vectors = self.retry.execute(|| provider.embed_batch(&texts)).await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::embedding(
                provider.model_id(),
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }
        let expected = provider.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::Configuration(format!(
                "embedding provider returned a {}-dimensional vector, expected {expected}",
                bad.len()
            )));
        }

        let entries: Vec<IndexEntry> =
            vectors.into_iter().zip(chunks).map(|(vector, chunk)| IndexEntry::new(vector, chunk)).collect();
        let count = entries.len();
        index.insert(entries)?;
        Ok(count)
    }
}

/// Builder for constructing an [`IngestPipeline`].
///
/// Only the embedding provider is required. The chunker defaults to a
/// [`FixedSizeChunker`] sized from the config, the config to
/// [`RagConfig::default()`] and the retry policy to
/// [`RetryPolicy::default()`].
#[derive(Default)]
pub struct IngestPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    retry: Option<RetryPolicy>,
    skip_persist: bool,
}

impl IngestPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the retry policy for embedding calls.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Keep the index in memory only.
    pub fn without_persistence(mut self) -> Self {
        self.skip_persist = true;
        self
    }

    /// Build the [`IngestPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the embedding provider is
    /// missing or the config is invalid.
    pub fn build(self) -> Result<IngestPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::from_config(&config)?),
        };

        Ok(IngestPipeline {
            config,
            embedding_provider,
            chunker,
            retry: self.retry.unwrap_or_default(),
            persist: !self.skip_persist,
        })
    }
}
