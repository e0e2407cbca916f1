//! A cloneable handle for using one index from many tasks.

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::document::{RawDocument, SearchResult};
use crate::error::Result;
use crate::flat::FlatIndex;
use crate::index::VectorIndex;
use crate::pipeline::{IngestPipeline, IngestReport};

/// A [`FlatIndex`] behind an async read-write lock.
///
/// Queries share the read lock. [`ingest_and_save`](Self::ingest_and_save)
/// holds the write lock from the first insert until the index is on disk,
/// so two ingests can never interleave their writes to the same directory.
#[derive(Debug, Clone, Default)]
pub struct SharedIndex {
    inner: Arc<RwLock<FlatIndex>>,
}

impl SharedIndex {
    /// Wrap an index.
    pub fn new(index: FlatIndex) -> Self {
        Self { inner: Arc::new(RwLock::new(index)) }
    }

    /// Acquire the read lock, e.g. to pass the index to a
    /// [`RetrievalAnswerer`](crate::RetrievalAnswerer).
    pub async fn read(&self) -> RwLockReadGuard<'_, FlatIndex> {
        self.inner.read().await
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the index holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Similarity search under the read lock.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.inner.read().await.search(query, k)
    }

    /// Ingest into the shared index and persist it, holding the write lock throughout.
    pub async fn ingest_and_save(
        &self,
        pipeline: &IngestPipeline,
        documents: &[RawDocument],
    ) -> Result<IngestReport> {
        let mut index = self.inner.write().await;
        pipeline.ingest_into(&mut index, documents).await
    }

    /// Swap in a rebuilt index, returning the old one.
    pub async fn replace(&self, index: FlatIndex) -> FlatIndex {
        std::mem::replace(&mut *self.inner.write().await, index)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::{Chunk, IndexEntry};

    fn one_entry_index() -> FlatIndex {
        let mut index = FlatIndex::new();
        let chunk = Chunk {
            id: "c".into(),
            text: "t".into(),
            document_id: "d".into(),
            offset: 0,
            index: 0,
            metadata: HashMap::new(),
        };
        index.insert(vec![IndexEntry::new(vec![1.0, 0.0], chunk)]).unwrap();
        index
    }

    #[tokio::test]
    async fn clones_see_the_same_index() {
        let shared = SharedIndex::default();
        let other = shared.clone();
        assert!(other.is_empty().await);

        let old = shared.replace(one_entry_index()).await;
        assert!(old.is_empty());
        assert_eq!(other.len().await, 1);
        assert_eq!(other.search(&[1.0, 0.0], 3).await.unwrap().len(), 1);
    }
}
