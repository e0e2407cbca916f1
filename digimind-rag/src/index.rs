//! Vector index trait and similarity helpers.

use std::path::Path;

use async_trait::async_trait;

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;

/// An ordered collection of (vector, chunk) entries with similarity search.
///
/// Searching is synchronous: indexes hold their entries in memory. Saving
/// writes the whole structure to a directory; loading is a constructor on
/// the concrete type (see [`FlatIndex::load`](crate::FlatIndex::load)).
///
/// # Example
///
/// ```rust,ignore
/// use digimind_rag::{FlatIndex, VectorIndex};
///
/// let mut index = FlatIndex::new();
/// index.insert(entries)?;
/// let top = index.search(&query_vector, 3)?;
/// index.save("digimind_index".as_ref()).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimensionality shared by every stored vector, or `None` while empty.
    fn dimensions(&self) -> Option<usize>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    /// Whether the index holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append entries in order. Either all entries are stored or none are.
    fn insert(&mut self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Return up to `k` entries most similar to `query`, highest score first.
    ///
    /// `k` larger than the index is clamped; `k == 0` is an
    /// [`InvalidArgument`](crate::RagError::InvalidArgument). Equal scores
    /// keep insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Maximal-marginal-relevance search.
    ///
    /// The `fetch_k` most similar entries form the candidate pool, from
    /// which `k` are picked greedily by
    /// `lambda * similarity(query) - (1 - lambda) * max similarity(selected)`.
    /// Results come back in selection order and carry their query similarity.
    fn search_mmr(&self, query: &[f32], k: usize, lambda: f32, fetch_k: usize) -> Result<Vec<SearchResult>>;

    /// Persist the whole index into `dir`.
    async fn save(&self, dir: &Path) -> Result<()>;
}

/// Euclidean length of a vector.
///
/// Accumulated in `f64`: squaring large `f32` components overflows `f32`.
pub(crate) fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

/// Cosine similarity using precomputed norms. Zero vectors score 0.0.
pub(crate) fn cosine(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| f64::from(x) * f64::from(y)).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine(a, norm(a), b, norm(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_ignores_magnitude() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 3.0])).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn large_components_do_not_overflow() {
        assert!((cosine_similarity(&[1e20, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[f32::MAX, f32::MAX], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[3e30, 4e30], &[4.0, 3.0]).is_finite());
    }
}
