//! Top-k retrieval over a [`VectorIndex`].

use tracing::{debug, error};

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Embeds a query and returns the closest chunks from an index.
///
/// The retriever only depends on the [`VectorIndex`] trait, so exact and
/// approximate backends are interchangeable behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Retriever {
    top_k: usize,
    similarity_threshold: f32,
}

impl Default for Retriever {
    fn default() -> Self {
        Self { top_k: 4, similarity_threshold: -1.0 }
    }
}

impl Retriever {
    pub fn new(top_k: usize) -> Self {
        Self { top_k, ..Self::default() }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self { top_k: config.top_k, similarity_threshold: config.similarity_threshold }
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the configured number of chunks for `query`.
    pub async fn retrieve(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
        index: &dyn VectorIndex,
    ) -> Result<Vec<RetrievalResult>> {
        self.retrieve_k(query, embedder, index, self.top_k).await
    }

    /// Retrieve up to `k` chunks for `query`, bypassing the configured `top_k`.
    ///
    /// # Errors
    ///
    /// Propagates embedding and index errors unchanged.
    pub async fn retrieve_k(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
        index: &dyn VectorIndex,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let embedding = embedder.embed(query).await.inspect_err(|e| {
            error!(provider = embedder.name(), error = %e, "query embedding failed");
        })?;

        let results = index.query(&embedding, k).await?;
        let threshold = self.similarity_threshold;
        let filtered: Vec<RetrievalResult> =
            results.into_iter().filter(|r| r.score >= threshold).collect();

        debug!(k, result_count = filtered.len(), "retrieved chunks");
        Ok(filtered)
    }
}
