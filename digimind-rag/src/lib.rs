//! # digimind-rag
//!
//! Retrieval-augmented question answering for DigiMind.
//!
//! ## Overview
//!
//! Ingest turns uploaded files into a searchable index:
//!
//! ```text
//! RawDocument → Chunker → EmbeddingProvider → VectorIndex → save
//! ```
//!
//! Answering grounds a chat model on the closest chunks:
//!
//! ```text
//! query → EmbeddingProvider → VectorIndex::search → prompt → ChatModel
//! ```
//!
//! - [`Chunker`] with [`FixedSizeChunker`] and [`RecursiveChunker`]
//! - [`EmbeddingProvider`] with an OpenAI-compatible implementation (feature `openai`)
//! - [`VectorIndex`] with the exact [`FlatIndex`], MMR search and JSON persistence
//! - [`IngestPipeline`] with per-document failure reporting
//! - [`RetrievalAnswerer`] with bounded retry and fallback messages
//! - [`SharedIndex`] for serialising ingest against concurrent queries
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use digimind_rag::{FlatIndex, IngestPipeline, RagConfig, RawDocument, RetrievalAnswerer};
//!
//! let config = RagConfig::default();
//! let pipeline = IngestPipeline::builder()
//!     .config(config.clone())
//!     .embedding_provider(embedder.clone())
//!     .build()?;
//! pipeline.ingest(&[RawDocument::new("notes.txt", bytes)]).await?;
//!
//! let index = FlatIndex::load_or_empty(&config.index_dir).await?;
//! let answerer = RetrievalAnswerer::new(embedder, model).with_config(&config);
//! println!("{}", answerer.answer("What is in my notes?", &index, config.top_k).await?);
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod flat;
pub mod index;
mod mmr;
pub mod persistence;
pub mod pipeline;
pub mod shared;

#[cfg(feature = "openai")]
pub mod openai;

pub use answer::{Answer, RetrievalAnswerer, compose_prompt};
pub use chunking::{Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder, SearchMode};
pub use document::{Chunk, Document, IndexEntry, RawDocument, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use flat::FlatIndex;
pub use index::{VectorIndex, cosine_similarity};
pub use persistence::{IndexManifest, read_manifest};
pub use pipeline::{DocumentFailure, IngestOutcome, IngestPipeline, IngestPipelineBuilder, IngestReport, IngestedDocument};
pub use shared::SharedIndex;

#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingConfig, OpenAIEmbeddingProvider};
