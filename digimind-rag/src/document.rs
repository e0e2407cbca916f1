//! Data types for documents, chunks, index entries and search results.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// An uploaded file as the caller received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// File name or other caller-chosen identifier.
    pub name: String,
    /// Undecoded content.
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Wrap uploaded bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }

    /// Attach one metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Decode an uploaded file as UTF-8 text, dropping a leading byte-order mark.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Document`] if the bytes are not valid UTF-8.
    pub fn from_raw(raw: &RawDocument) -> Result<Self> {
        let bytes = raw.bytes.strip_prefix(UTF8_BOM).unwrap_or(&raw.bytes);
        let text = std::str::from_utf8(bytes).map_err(|e| RagError::Document {
            id: raw.name.clone(),
            message: format!("not valid UTF-8 text: {e}"),
        })?;
        Ok(Self::new(raw.name.clone(), text).with_metadata("source", raw.name.clone()))
    }

    /// Read and decode a file. The document id is the file name.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagError::Document { id: name.clone(), message: format!("read failed: {e}") })?;
        Self::from_raw(&RawDocument::new(name, bytes))
    }
}

/// A contiguous piece of a [`Document`], the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}_{index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Character offset of the chunk within the document.
    pub offset: usize,
    /// Position of the chunk within the document.
    pub index: usize,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

/// A stored (vector, chunk) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk's embedding.
    pub vector: Vec<f32>,
    /// The chunk itself.
    pub chunk: Chunk,
}

impl IndexEntry {
    /// Pair a vector with its chunk.
    pub fn new(vector: Vec<f32>, chunk: Chunk) -> Self {
        Self { vector, chunk }
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
