//! Error types for the `digimind-rag` crate.

use std::path::PathBuf;

use digimind_core::{ModelError, Retryable};
use thiserror::Error;

use crate::pipeline::DocumentFailure;

/// Errors that can occur in RAG operations.
#[derive(Debug, Clone, Error)]
pub enum RagError {
    /// Invalid chunking or search parameters, or vectors of mismatched dimensionality.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The embedding backend failed.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether a retry may succeed (timeouts, rate limits, server errors).
        transient: bool,
    },

    /// No persisted index exists at the given location.
    #[error("No index found at {}", path.display())]
    IndexNotFound {
        /// Directory that was searched.
        path: PathBuf,
    },

    /// A persisted index exists but cannot be read back.
    #[error("Index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// Directory holding the index.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A caller-supplied argument is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A single document could not be read or decoded.
    #[error("Document error ({id}): {message}")]
    Document {
        /// The document name.
        id: String,
        /// A description of the failure.
        message: String,
    },

    /// Writing the index to disk failed.
    #[error("Persistence error ({}): {message}", path.display())]
    Persistence {
        /// Path being written.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// Every supplied document failed, so nothing was inserted or saved.
    #[error("None of the {} documents could be ingested", failures.len())]
    NothingIngested {
        /// Why each document was skipped, in input order.
        failures: Vec<DocumentFailure>,
    },

    /// An error propagated from a generation backend.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RagError {
    /// Shorthand for a non-transient [`RagError::Embedding`].
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.into(), message: message.into(), transient: false }
    }
}

impl Retryable for RagError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Embedding { transient, .. } => *transient,
            Self::Model(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_embedding_errors_are_retryable() {
        let err = RagError::Embedding { provider: "p".into(), message: "429".into(), transient: true };
        assert!(err.is_transient());
        assert!(!RagError::embedding("p", "bad input").is_transient());
    }

    #[test]
    fn model_errors_keep_their_classification() {
        assert!(RagError::from(ModelError::Timeout).is_transient());
        assert!(!RagError::from(ModelError::Unauthorized("no".into())).is_transient());
    }

    #[test]
    fn configuration_and_index_errors_are_fatal() {
        assert!(!RagError::Configuration("x".into()).is_transient());
        assert!(!RagError::IndexNotFound { path: "idx".into() }.is_transient());
        assert_eq!(
            RagError::IndexNotFound { path: "idx".into() }.to_string(),
            "No index found at idx"
        );
    }
}
