//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] splits by exact character count with a fixed overlap
//! - [`RecursiveChunker`] pulls each cut back to a paragraph, line, sentence or
//!   word boundary when one is available
//!
//! Both count characters (Unicode scalar values), never bytes, and both keep
//! the same two guarantees: no chunk is longer than `chunk_size`, and each
//! chunk starts with the last `chunk_overlap` characters of the one before it.

use crate::config::{RagConfig, validate_chunking};
use crate::document::{Chunk, Document};
use crate::error::Result;

/// Separators tried by [`RecursiveChunker`], coarsest first.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A strategy for splitting documents into chunks.
///
/// Splitting is deterministic: calling [`split`](Chunker::split) twice on the
/// same document yields the same chunks.
pub trait Chunker: Send + Sync {
    /// Lazily split a document into chunks. An empty document yields nothing.
    fn split<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a>;

    /// Split a document and collect every chunk.
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split(document).collect()
    }
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use digimind_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`](crate::RagError::Configuration) unless
    /// `0 < chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

impl Chunker for FixedSizeChunker {
    fn split<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        Box::new(Windows::new(document, self.chunk_size, self.chunk_overlap, &[]))
    }
}

/// Splits at natural boundaries where possible: paragraphs, then lines,
/// then sentences, then words.
///
/// Each window is cut at the last separator that still leaves more than
/// `chunk_overlap` characters in the chunk, trying separators in order. If
/// none qualifies the window is cut at `chunk_size`, exactly like
/// [`FixedSizeChunker`]. The next window always starts `chunk_overlap`
/// characters before the cut.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with [`DEFAULT_SEPARATORS`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator list. Empty separators are ignored.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).filter(|s| !s.is_empty()).collect();
        self
    }
}

impl Chunker for RecursiveChunker {
    fn split<'a>(&'a self, document: &'a Document) -> Box<dyn Iterator<Item = Chunk> + 'a> {
        Box::new(Windows::new(document, self.chunk_size, self.chunk_overlap, &self.separators))
    }
}

/// Lazy window walk shared by both chunkers.
struct Windows<'a> {
    document: &'a Document,
    /// Byte offset of every character, plus the text length.
    offsets: Vec<usize>,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &'a [String],
    start: usize,
    index: usize,
    done: bool,
}

impl<'a> Windows<'a> {
    fn new(
        document: &'a Document,
        chunk_size: usize,
        chunk_overlap: usize,
        separators: &'a [String],
    ) -> Self {
        let text = &document.text;
        let offsets =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect::<Vec<_>>();
        Self {
            document,
            offsets,
            chunk_size,
            chunk_overlap,
            separators,
            start: 0,
            index: 0,
            done: text.is_empty(),
        }
    }

    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Latest separator end in `(start + overlap, hard_end]`, if any.
    fn boundary(&self, hard_end: usize) -> Option<usize> {
        let base = self.offsets[self.start];
        let window = &self.document.text[base..self.offsets[hard_end]];
        let floor = self.start + self.chunk_overlap;
        self.separators.iter().find_map(|separator| {
            let pos = window.rfind(separator.as_str())?;
            let end = self.offsets.binary_search(&(base + pos + separator.len())).ok()?;
            (end > floor).then_some(end)
        })
    }

    fn make_chunk(&self, end: usize) -> Chunk {
        let text = &self.document.text[self.offsets[self.start]..self.offsets[end]];
        let mut metadata = self.document.metadata.clone();
        metadata.insert("chunk_index".to_string(), self.index.to_string());
        Chunk {
            id: format!("{}_{}", self.document.id, self.index),
            text: text.to_string(),
            document_id: self.document.id.clone(),
            offset: self.start,
            index: self.index,
            metadata,
        }
    }
}

impl Iterator for Windows<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.char_count();
        let hard_end = (self.start + self.chunk_size).min(total);
        let end = if hard_end == total { total } else { self.boundary(hard_end).unwrap_or(hard_end) };

        let chunk = self.make_chunk(end);
        self.index += 1;
        if end == total {
            self.done = true;
        } else {
            self.start = end - self.chunk_overlap;
        }
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn doc(text: &str) -> Document {
        Document::new("doc", text)
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(matches!(FixedSizeChunker::new(10, 0), Err(RagError::Configuration(_))));
        assert!(matches!(FixedSizeChunker::new(10, 10), Err(RagError::Configuration(_))));
        assert!(matches!(RecursiveChunker::new(0, 0), Err(RagError::Configuration(_))));
    }

    #[test]
    fn empty_document_has_no_chunks() {
        let chunker = FixedSizeChunker::new(10, 2).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
    }

    #[test]
    fn short_document_is_one_chunk() {
        let chunker = FixedSizeChunker::new(50, 5).unwrap();
        let chunks = chunker.chunk(&doc("short text"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn sky_and_grass_overlap_by_five() {
        let chunker = FixedSizeChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&doc("The sky is blue. Grass is green."));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "The sky is blue. Gra");
        assert_eq!(chunks[1].text, ". Grass is green.");
        assert_eq!(chunks[1].offset, 15);
        assert_eq!(&chunks[0].text[15..], &chunks[1].text[..5]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let chunker = FixedSizeChunker::new(4, 1).unwrap();
        let chunks = chunker.chunk(&doc("ééééééé"));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["éééé", "éééé"]);
    }

    #[test]
    fn chunks_inherit_metadata() {
        let chunker = FixedSizeChunker::new(3, 1).unwrap();
        let chunks = chunker.chunk(&doc("abcdef").with_metadata("source", "a.txt"));
        assert_eq!(chunks[1].metadata.get("source").map(String::as_str), Some("a.txt"));
        assert_eq!(chunks[1].metadata.get("chunk_index").map(String::as_str), Some("1"));
        assert_eq!(chunks[1].document_id, "doc");
    }

    #[test]
    fn splitting_is_restartable() {
        let chunker = RecursiveChunker::new(30, 6).unwrap();
        let document = doc("First paragraph here.\n\nSecond one follows. It is longer than the first.");
        let first: Vec<_> = chunker.split(&document).collect();
        let second: Vec<_> = chunker.split(&document).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn recursive_prefers_sentence_boundaries() {
        let chunker = RecursiveChunker::new(20, 5).unwrap();
        let chunks = chunker.chunk(&doc("The sky is blue. Grass is green."));

        assert_eq!(chunks[0].text, "The sky is blue. ");
        assert_eq!(chunks[1].text, "lue. Grass is green.");
        assert_eq!(chunks[1].offset, 12);
    }

    #[test]
    fn recursive_prefers_paragraphs_over_words() {
        let chunker = RecursiveChunker::new(24, 3).unwrap();
        let chunks = chunker.chunk(&doc("alpha beta\n\ngamma delta epsilon zeta"));
        assert_eq!(chunks[0].text, "alpha beta\n\n");
    }

    #[test]
    fn recursive_falls_back_to_hard_cut() {
        let chunker = RecursiveChunker::new(5, 2).unwrap();
        let chunks = chunker.chunk(&doc("abcdefghij"));
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abcde", "defgh", "ghij"]);
    }
}
