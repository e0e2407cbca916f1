//! Exact (brute-force) vector index.
//!
//! [`FlatIndex`] keeps entries in insertion order alongside each vector's
//! norm and scans all of them on every query. Norms are derived data: they
//! are never persisted and are recomputed the same way on load, so a
//! reloaded index scores queries identically.

use std::path::Path;

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::index::{VectorIndex, cosine, norm};
use crate::mmr::{self, Candidate};
use crate::persistence;

/// Index state to roll back to when an ingest is abandoned.
pub(crate) struct Checkpoint {
    len: usize,
    dimensions: Option<usize>,
    embedding_model: Option<String>,
}

/// An in-memory index using exact cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
    norms: Vec<f64>,
    dimensions: Option<usize>,
    embedding_model: Option<String>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which embedding model produced the vectors.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// The embedding model recorded for this index, if any.
    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub(crate) fn set_embedding_model(&mut self, model: Option<String>) {
        self.embedding_model = model;
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.entries.len(),
            dimensions: self.dimensions,
            embedding_model: self.embedding_model.clone(),
        }
    }

    /// Drop everything appended since `checkpoint` was taken.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.entries.truncate(checkpoint.len);
        self.norms.truncate(checkpoint.len);
        self.dimensions = checkpoint.dimensions;
        self.embedding_model = checkpoint.embedding_model;
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Load an index previously written by [`VectorIndex::save`].
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if `dir` or its manifest does not exist.
    /// - [`RagError::IndexCorrupt`] if the files cannot be parsed or disagree
    ///   with each other.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        persistence::load(dir.as_ref()).await
    }

    /// Like [`load`](Self::load), but a missing index yields an empty one.
    pub async fn load_or_empty(dir: impl AsRef<Path>) -> Result<Self> {
        match Self::load(dir).await {
            Err(RagError::IndexNotFound { .. }) => Ok(Self::new()),
            other => other,
        }
    }

    fn check_query(&self, query: &[f32]) -> Result<()> {
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::InvalidArgument("query vector contains non-finite values".into()));
        }
        match self.dimensions {
            Some(dims) if dims != query.len() => Err(RagError::Configuration(format!(
                "query has {} dimensions but the index holds {dims}-dimensional vectors",
                query.len()
            ))),
            _ => Ok(()),
        }
    }

    /// Every entry position with its score, best first, ties in insertion order.
    fn rank(&self, query: &[f32]) -> Vec<(usize, f32)> {
        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, &n))| (i, cosine(&entry.vector, n, query, query_norm)))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }

    fn result(&self, position: usize, score: f32) -> SearchResult {
        SearchResult { chunk: self.entries[position].chunk.clone(), score }
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::InvalidArgument("k must be greater than zero".into()));
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn insert(&mut self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut dims = self.dimensions;
        for entry in &entries {
            let len = entry.vector.len();
            if len == 0 {
                return Err(RagError::InvalidArgument(format!("chunk '{}' has an empty vector", entry.chunk.id)));
            }
            if entry.vector.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidArgument(format!(
                    "chunk '{}' has a vector with non-finite values",
                    entry.chunk.id
                )));
            }
            match dims {
                Some(expected) if expected != len => {
                    return Err(RagError::Configuration(format!(
                        "chunk '{}' has {len} dimensions but the index holds {expected}-dimensional vectors",
                        entry.chunk.id
                    )));
                }
                _ => dims = Some(len),
            }
        }

        self.dimensions = dims;
        self.norms.extend(entries.iter().map(|e| norm(&e.vector)));
        self.entries.extend(entries);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        check_k(k)?;
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_query(query)?;

        Ok(self.rank(query).into_iter().take(k).map(|(i, score)| self.result(i, score)).collect())
    }

    fn search_mmr(&self, query: &[f32], k: usize, lambda: f32, fetch_k: usize) -> Result<Vec<SearchResult>> {
        check_k(k)?;
        if !(0.0..=1.0).contains(&lambda) {
            return Err(RagError::InvalidArgument(format!("MMR lambda ({lambda}) must be within [0, 1]")));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_query(query)?;

        let pool: Vec<(usize, f32)> = self.rank(query).into_iter().take(fetch_k.max(k)).collect();
        let candidates: Vec<Candidate<'_>> = pool
            .iter()
            .map(|&(i, relevance)| Candidate { vector: &self.entries[i].vector, norm: self.norms[i], relevance })
            .collect();

        Ok(mmr::select(&candidates, k, lambda)
            .into_iter()
            .map(|pick| {
                let (i, score) = pool[pick];
                self.result(i, score)
            })
            .collect())
    }

    async fn save(&self, dir: &Path) -> Result<()> {
        persistence::save(self, dir).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(
            vector,
            Chunk {
                id: id.to_string(),
                text: format!("text of {id}"),
                document_id: "doc".to_string(),
                offset: 0,
                index: 0,
                metadata: HashMap::new(),
            },
        )
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    #[test]
    fn k_is_clamped_to_index_size() {
        let mut index = FlatIndex::new();
        index.insert(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])]).unwrap();

        let results = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(ids(&results), ["a", "b"]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn zero_k_is_invalid() {
        let index = FlatIndex::new();
        assert!(matches!(index.search(&[1.0], 0), Err(RagError::InvalidArgument(_))));
        assert!(matches!(index.search_mmr(&[1.0], 0, 0.5, 4), Err(RagError::InvalidArgument(_))));
    }

    #[test]
    fn empty_index_returns_nothing() {
        assert!(FlatIndex::new().search(&[0.3, 0.4], 3).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = FlatIndex::new();
        index.insert(vec![entry("first", vec![2.0, 0.0]), entry("second", vec![1.0, 0.0])]).unwrap();
        index.insert(vec![entry("third", vec![5.0, 0.0])]).unwrap();

        assert_eq!(ids(&index.search(&[1.0, 0.0], 3).unwrap()), ["first", "second", "third"]);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let mut index = FlatIndex::new();
        index.insert(vec![entry("a", vec![1.0, 0.0])]).unwrap();

        let err = index.insert(vec![entry("b", vec![1.0, 0.0]), entry("c", vec![1.0, 0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
        assert_eq!(index.len(), 1, "failed insert must not store anything");

        assert!(matches!(index.search(&[1.0, 0.0, 0.0], 1), Err(RagError::Configuration(_))));
    }

    #[test]
    fn non_finite_vectors_are_rejected() {
        let mut index = FlatIndex::new();
        assert!(matches!(index.insert(vec![entry("a", vec![f32::NAN])]), Err(RagError::InvalidArgument(_))));
        assert!(matches!(index.insert(vec![entry("a", vec![])]), Err(RagError::InvalidArgument(_))));
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), None);
    }

    #[test]
    fn mmr_skips_near_duplicates() {
        let mut index = FlatIndex::new();
        index
            .insert(vec![
                entry("dup1", vec![1.0, 0.25]),
                entry("dup2", vec![1.0, 0.26]),
                entry("other", vec![0.6, 0.8]),
            ])
            .unwrap();

        let plain = index.search(&[1.0, 0.3], 2).unwrap();
        assert_eq!(ids(&plain), ["dup2", "dup1"]);

        let diverse = index.search_mmr(&[1.0, 0.3], 2, 0.5, 8).unwrap();
        assert_eq!(ids(&diverse), ["dup2", "other"]);
        assert_eq!(diverse[0].score, plain[0].score);
    }

    #[test]
    fn mmr_with_lambda_one_matches_search() {
        let mut index = FlatIndex::new();
        index
            .insert(vec![entry("a", vec![1.0, 0.1]), entry("b", vec![0.2, 1.0]), entry("c", vec![0.9, 0.5])])
            .unwrap();

        let plain = index.search(&[1.0, 0.2], 3).unwrap();
        let mmr = index.search_mmr(&[1.0, 0.2], 3, 1.0, 3).unwrap();
        assert_eq!(plain, mmr);
    }

    #[test]
    fn mmr_rejects_bad_lambda() {
        let mut index = FlatIndex::new();
        index.insert(vec![entry("a", vec![1.0])]).unwrap();
        assert!(matches!(index.search_mmr(&[1.0], 1, 1.5, 4), Err(RagError::InvalidArgument(_))));
        assert!(matches!(index.search_mmr(&[1.0], 1, f32::NAN, 4), Err(RagError::InvalidArgument(_))));
    }
}
