//! Error types for the `docqa-rag` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the vector index.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    /// The index was queried before any successful build.
    #[error("index has not been built")]
    NotInitialized,

    /// The query vector does not match the dimensionality of the stored vectors.
    #[error("query vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch {
        /// Dimensionality of the indexed vectors.
        expected: usize,
        /// Dimensionality of the query vector.
        actual: usize,
    },
}

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document could not be turned into chunks.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// A question was asked before a document was ingested.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The text generation backend failed.
    #[error("Generation error ({generator}): {message}")]
    Generation {
        /// The generator that produced the error.
        generator: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request itself was malformed (for example an empty question).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    /// Shorthand for an [`RagError::Embedding`] error.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Embedding { provider: provider.into(), message: message.into() }
    }

    /// Shorthand for an [`RagError::Generation`] error.
    pub fn generation(generator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation { generator: generator.into(), message: message.into() }
    }

    /// The machine-checkable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ingestion(_) => ErrorKind::Ingestion,
            Self::Embedding { .. } => ErrorKind::Embedding,
            Self::Index(_) => ErrorKind::Index,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Coarse classification of a [`RagError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Ingestion,
    Embedding,
    Index,
    NotReady,
    Generation,
    Configuration,
    InvalidInput,
}

impl ErrorKind {
    /// Whether the failure came from an external backend and may succeed on retry.
    ///
    /// Ingestion and input errors need a different request, configuration errors
    /// need an operator.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Embedding | Self::Generation)
    }

    /// The snake_case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Embedding => "embedding",
            Self::Index => "index",
            Self::NotReady => "not_ready",
            Self::Generation => "generation",
            Self::Configuration => "configuration",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
