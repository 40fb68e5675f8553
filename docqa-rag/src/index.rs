//! Vector index with exact cosine-similarity search.
//!
//! [`VectorIndex`] is the seam between retrieval and the similarity backend;
//! [`FlatIndex`] is the exact, in-memory implementation. A built `FlatIndex`
//! is immutable, so any number of readers may query it concurrently while a
//! replacement is being built elsewhere.

use async_trait::async_trait;
use tracing::{error, info};

use crate::document::{Chunk, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexError, RagError, Result};

/// A store of embedded chunks that answers nearest-neighbour queries.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::build(chunks, &embedder).await?;
/// let results = index.query(&query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `k` entries with the highest cosine similarity to
    /// `embedding`, in descending score order. Equal scores keep insertion order.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    /// Number of stored entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensionality of the stored vectors, or `None` before the first build.
    fn dimensions(&self) -> Option<usize>;
}

/// A chunk stored together with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Exact nearest-neighbour search over every stored entry.
///
/// `FlatIndex::default()` is an unbuilt index: querying it fails with
/// [`IndexError::NotInitialized`].
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
    dimensions: Option<usize>,
}

impl FlatIndex {
    /// Embed every chunk and return a fully built index.
    ///
    /// All chunk texts are sent to the provider in one
    /// [`embed_batch`](EmbeddingProvider::embed_batch) call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the provider fails or returns vectors
    /// whose count or width does not match.
    pub async fn build(chunks: Vec<Chunk>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let dimensions = embedder.dimensions();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            if texts.is_empty() { Vec::new() } else { embedder.embed_batch(&texts).await? };

        if embeddings.len() != chunks.len() {
            error!(
                provider = embedder.name(),
                expected = chunks.len(),
                actual = embeddings.len(),
                "embedding count mismatch"
            );
            return Err(RagError::embedding(
                embedder.name(),
                format!("expected {} embeddings, got {}", chunks.len(), embeddings.len()),
            ));
        }

        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(RagError::embedding(
                embedder.name(),
                format!("expected {dimensions}-dimensional vectors, got {}", bad.len()),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        info!(entry_count = entries.len(), dimensions, "built vector index");
        Ok(Self { entries, dimensions: Some(dimensions) })
    }

    /// Build directly from pre-computed entries.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the entries disagree on dimensionality.
    pub fn from_entries(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        if entries.iter().any(|e| e.embedding.len() != dimensions) {
            return Err(RagError::embedding("precomputed", "entries have mixed dimensions"));
        }
        Ok(Self { entries, dimensions: Some(dimensions) })
    }

    pub fn is_built(&self) -> bool {
        self.dimensions.is_some()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Cosine similarity of two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let dimensions = self.dimensions.ok_or(IndexError::NotInitialized)?;
        if !self.entries.is_empty() && embedding.len() != dimensions {
            let mismatch =
                IndexError::DimensionMismatch { expected: dimensions, actual: embedding.len() };
            return Err(mismatch.into());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(&entry.embedding, embedding)))
            .collect();

        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| RetrievalResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}
