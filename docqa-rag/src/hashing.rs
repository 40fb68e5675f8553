//! Local embedding provider based on signed feature hashing.
//!
//! [`HashingEmbeddingProvider`] needs no model download or network access.
//! Word tokens and character trigrams are hashed with FNV-1a into a fixed
//! number of buckets, so texts sharing vocabulary land close together in
//! cosine space. FNV-1a is used instead of `std`'s hasher because its output
//! is fixed across platforms and compiler versions.

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

/// A deterministic, dependency-free [`EmbeddingProvider`].
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::HashingEmbeddingProvider;
///
/// let provider = HashingEmbeddingProvider::new(256)?;
/// let a = provider.embed("the cat sat").await?;
/// let b = provider.embed("the cat sat").await?;
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Same width as `all-MiniLM-L6-v2`, so stored configs stay interchangeable.
    pub const DEFAULT_DIMENSIONS: usize = 384;

    /// Create a provider producing `dimensions`-wide vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `dimensions` is zero.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Configuration("embedding dimensions must be non-zero".into()));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        // The top bit decides the sign so collisions tend to cancel out.
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self { dimensions: Self::DEFAULT_DIMENSIONS }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(RagError::embedding(self.name(), "cannot embed empty text"));
        }

        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimensions];

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, word, WORD_WEIGHT);
        }

        let chars: Vec<char> = lowered.chars().collect();
        if chars.len() < 3 {
            self.add_feature(&mut vector, &lowered, TRIGRAM_WEIGHT);
        } else {
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                self.add_feature(&mut vector, &gram, TRIGRAM_WEIGHT);
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(RagError::embedding(self.name(), "text produced a degenerate vector"));
        }
        for value in &mut vector {
            *value /= norm;
        }

        debug!(provider = self.name(), text_len = text.len(), "embedded text");
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "Hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn embedding_is_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(128).unwrap();
        let a = provider.embed("Rust guarantees memory safety.").await.unwrap();
        let b = provider.embed("Rust guarantees memory safety.").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let provider = HashingEmbeddingProvider::default();
        let query = provider.embed("what is the refund policy").await.unwrap();
        let related = provider.embed("Our refund policy allows returns within 30 days.").await.unwrap();
        let unrelated = provider.embed("The rocket engine burns liquid oxygen.").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let provider = HashingEmbeddingProvider::default();
        let err = provider.embed("").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let provider = HashingEmbeddingProvider::new(32).unwrap();
        let batch = provider.embed_batch(&["alpha", "beta"]).await.unwrap();
        assert_eq!(batch[0], provider.embed("alpha").await.unwrap());
        assert_eq!(batch[1], provider.embed("beta").await.unwrap());
    }

    #[test]
    fn zero_dimensions_is_a_configuration_error() {
        assert!(matches!(HashingEmbeddingProvider::new(0), Err(RagError::Configuration(_))));
    }
}
