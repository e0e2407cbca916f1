//! Configuration for the RAG pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Directory used for the persisted index when none is configured.
pub const DEFAULT_INDEX_DIR: &str = "digimind_index";

/// How retrieved chunks are chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchMode {
    /// Plain top-k by cosine similarity.
    Similarity,
    /// Maximal marginal relevance over a larger candidate pool.
    Mmr {
        /// Weight of query relevance against diversity, in `[0, 1]`.
        lambda: f32,
        /// The candidate pool holds `k * fetch_multiplier` entries.
        fetch_multiplier: usize,
    },
}

impl Default for SearchMode {
    fn default() -> Self {
        Self::Mmr { lambda: 0.5, fetch_multiplier: 4 }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per query.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` keeps every retrieved chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Retrieval strategy.
    pub search_mode: SearchMode,
    /// Where the index is persisted after ingest.
    pub index_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
            top_k: 3,
            similarity_threshold: None,
            search_mode: SearchMode::default(),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if self.similarity_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(RagError::Configuration("similarity_threshold must be finite".to_string()));
        }
        if let SearchMode::Mmr { lambda, fetch_multiplier } = self.search_mode {
            if !(0.0..=1.0).contains(&lambda) {
                return Err(RagError::Configuration(format!("MMR lambda ({lambda}) must be within [0, 1]")));
            }
            if fetch_multiplier == 0 {
                return Err(RagError::Configuration(
                    "MMR fetch_multiplier must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Reject chunk parameters that cannot produce overlapping windows.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_overlap == 0 {
        return Err(RagError::Configuration("chunk_overlap must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the retrieval strategy.
    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.config.search_mode = mode;
        self
    }

    /// Set the directory the index is persisted to.
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_overlap == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - the MMR `lambda` is outside `[0, 1]` or `fetch_multiplier == 0`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
