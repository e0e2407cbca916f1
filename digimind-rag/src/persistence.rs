//! On-disk format for [`FlatIndex`].
//!
//! An index directory holds two JSON files:
//!
//! - `manifest.json`: format version, dimensionality, entry count, embedding
//!   model and creation time
//! - `entries.json`: the ordered list of `{ vector, chunk }` entries
//!
//! Each file is written to a temporary file and renamed into place, so
//! neither is ever seen half-written. The two renames are not atomic
//! together: entries go first, and a save interrupted between them leaves
//! the previous manifest beside the new entries. `load` checks the entry
//! count and vector length against the manifest and reports
//! [`RagError::IndexCorrupt`] when they disagree. If a new entries file
//! happens to match the old manifest on both, the new entries load with
//! the old manifest's model name and timestamp.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::IndexEntry;
use crate::error::{RagError, Result};
use crate::flat::FlatIndex;
use crate::index::VectorIndex;

/// Version written into new manifests.
pub const FORMAT_VERSION: u32 = 1;
/// Manifest file name inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Entries file name inside an index directory.
pub const ENTRIES_FILE: &str = "entries.json";

/// Summary stored next to the entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// On-disk format version.
    pub format_version: u32,
    /// Vector length, `None` for an empty index.
    pub dimensions: Option<usize>,
    /// Number of entries in `entries.json`.
    pub entry_count: usize,
    /// Model that produced the vectors, if known.
    pub embedding_model: Option<String>,
    /// When the index was written.
    pub created_at: DateTime<Utc>,
}

/// Read only the manifest of a persisted index.
///
/// Useful to check whether an index exists, and what produced it, without
/// loading every vector.
pub async fn read_manifest(dir: impl AsRef<Path>) -> Result<IndexManifest> {
    let dir = dir.as_ref();
    let path = dir.join(MANIFEST_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(RagError::IndexNotFound { path: dir.to_path_buf() });
        }
        Err(e) => return Err(RagError::Persistence { path, message: e.to_string() }),
    };
    let manifest: IndexManifest =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(&path, format!("invalid manifest: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(corrupt(&path, format!("unsupported format version {}", manifest.format_version)));
    }
    Ok(manifest)
}

pub(crate) async fn save(index: &FlatIndex, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| persistence_error(dir, e))?;

    let manifest = IndexManifest {
        format_version: FORMAT_VERSION,
        dimensions: index.dimensions(),
        entry_count: index.len(),
        embedding_model: index.embedding_model().map(str::to_string),
        created_at: Utc::now(),
    };

    let entries = serde_json::to_vec(index.entries())
        .map_err(|e| RagError::Persistence { path: dir.join(ENTRIES_FILE), message: e.to_string() })?;
    let manifest = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| RagError::Persistence { path: dir.join(MANIFEST_FILE), message: e.to_string() })?;

    write_atomically(&dir.join(ENTRIES_FILE), &entries).await?;
    write_atomically(&dir.join(MANIFEST_FILE), &manifest).await?;

    info!(path = %dir.display(), entry_count = index.len(), "saved index");
    Ok(())
}

pub(crate) async fn load(dir: &Path) -> Result<FlatIndex> {
    let manifest = read_manifest(dir).await?;

    let path = dir.join(ENTRIES_FILE);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(corrupt(&path, "entries file is missing"));
        }
        Err(e) => return Err(persistence_error(&path, e)),
    };
    let entries: Vec<IndexEntry> =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(&path, format!("invalid entries: {e}")))?;

    if entries.len() != manifest.entry_count {
        return Err(corrupt(
            &path,
            format!("manifest lists {} entries but {} were found", manifest.entry_count, entries.len()),
        ));
    }
    if let Some(entry) = entries.iter().find(|e| Some(e.vector.len()) != manifest.dimensions) {
        return Err(corrupt(
            &path,
            format!(
                "chunk '{}' has {} dimensions, manifest says {:?}",
                entry.chunk.id,
                entry.vector.len(),
                manifest.dimensions
            ),
        ));
    }

    let mut index = FlatIndex::new();
    index.set_embedding_model(manifest.embedding_model);
    index.insert(entries).map_err(|e| corrupt(&path, e.to_string()))?;

    debug!(path = %dir.display(), entry_count = index.len(), "loaded index");
    Ok(index)
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, bytes).await.map_err(|e| persistence_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| persistence_error(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn corrupt(path: &Path, message: impl Into<String>) -> RagError {
    RagError::IndexCorrupt { path: path.to_path_buf(), message: message.into() }
}

fn persistence_error(path: &Path, e: std::io::Error) -> RagError {
    RagError::Persistence { path: path.to_path_buf(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn sample_index() -> FlatIndex {
        let chunk = |id: &str| Chunk {
            id: id.to_string(),
            text: format!("body {id}"),
            document_id: "a.txt".to_string(),
            offset: 3,
            index: 1,
            metadata: HashMap::from([("source".to_string(), "a.txt".to_string())]),
        };
        let mut index = FlatIndex::new().with_embedding_model("mini");
        index
            .insert(vec![
                IndexEntry::new(vec![0.1, -0.2, 0.333_333_34], chunk("x")),
                IndexEntry::new(vec![1.0e-7, 5.5, -3.25], chunk("y")),
            ])
            .unwrap();
        index
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = sample_index();
        index.save(dir.path()).await.unwrap();

        let loaded = FlatIndex::load(dir.path()).await.unwrap();
        assert_eq!(loaded.entries(), index.entries());
        assert_eq!(loaded.dimensions(), Some(3));
        assert_eq!(loaded.embedding_model(), Some("mini"));

        let manifest = read_manifest(dir.path()).await.unwrap();
        assert_eq!(manifest.entry_count, 2);
        assert_eq!(manifest.format_version, FORMAT_VERSION);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[tokio::test]
    async fn empty_index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        FlatIndex::new().save(dir.path()).await.unwrap();
        let loaded = FlatIndex::load(dir.path()).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimensions(), None);
    }

    #[tokio::test]
    async fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("never-written");
        assert!(matches!(FlatIndex::load(&missing).await, Err(RagError::IndexNotFound { .. })));
        assert!(FlatIndex::load_or_empty(&missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_manifest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(MANIFEST_FILE), b"{ not json").await.unwrap();
        assert!(matches!(FlatIndex::load(dir.path()).await, Err(RagError::IndexCorrupt { .. })));
        assert!(matches!(FlatIndex::load_or_empty(dir.path()).await, Err(RagError::IndexCorrupt { .. })));
    }

    #[tokio::test]
    async fn inconsistent_files_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).await.unwrap();

        tokio::fs::write(dir.path().join(ENTRIES_FILE), b"[]").await.unwrap();
        assert!(matches!(FlatIndex::load(dir.path()).await, Err(RagError::IndexCorrupt { .. })));

        tokio::fs::remove_file(dir.path().join(ENTRIES_FILE)).await.unwrap();
        assert!(matches!(FlatIndex::load(dir.path()).await, Err(RagError::IndexCorrupt { .. })));
    }

    #[tokio::test]
    async fn save_interrupted_before_the_manifest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).await.unwrap();

        let mut grown = sample_index();
        grown.insert(vec![IndexEntry::new(vec![1.0, 1.0, 1.0], grown.entries()[0].chunk.clone())]).unwrap();
        let newer = tempfile::tempdir().unwrap();
        grown.save(newer.path()).await.unwrap();
        tokio::fs::copy(newer.path().join(ENTRIES_FILE), dir.path().join(ENTRIES_FILE)).await.unwrap();

        let err = FlatIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, RagError::IndexCorrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        sample_index().save(dir.path()).await.unwrap();

        let path = dir.path().join(MANIFEST_FILE);
        let mut manifest: serde_json::Value =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        manifest["format_version"] = serde_json::json!(99);
        tokio::fs::write(&path, serde_json::to_vec(&manifest).unwrap()).await.unwrap();

        assert!(matches!(FlatIndex::load(dir.path()).await, Err(RagError::IndexCorrupt { .. })));
    }
}
