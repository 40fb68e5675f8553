//! Configuration for chunking, retrieval, generation, and model backends.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::hashing::HashingEmbeddingProvider;

/// Configuration parameters for the question-answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks of the same page.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Minimum similarity score for retrieved chunks. `-1.0` keeps everything.
    pub similarity_threshold: f32,
    /// Sampling temperature passed to the generator.
    pub temperature: f32,
    /// Upper bound on a single generator call. Serialized as seconds.
    #[serde(rename = "generation_timeout_secs", with = "duration_secs")]
    pub generation_timeout: Duration,
    /// Upper bound on embedding a whole document. Serialized as seconds.
    #[serde(rename = "embedding_timeout_secs", with = "duration_secs")]
    pub embedding_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 4,
            similarity_threshold: -1.0,
            temperature: 0.0,
            generation_timeout: Duration::from_secs(60),
            embedding_timeout: Duration::from_secs(120),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    pub fn embedding_timeout(&self) -> Duration {
        self.embedding_timeout
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is outside `[0, 2]`
    /// - either timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Configuration(format!(
                "temperature ({}) must be within [0, 2]",
                self.temperature
            )));
        }
        if self.generation_timeout.is_zero() || self.embedding_timeout.is_zero() {
            return Err(RagError::Configuration("timeouts must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = timeout;
        self
    }

    pub fn embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.embedding_timeout = timeout;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Durations as (possibly fractional) seconds on the wire.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Default OpenRouter endpoint, used for generation unless overridden.
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Default chat model served through OpenRouter.
pub const DEFAULT_GENERATION_MODEL: &str = "mistralai/mistral-7b-instruct";

/// The supported embedding backends and the parameters each one needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local feature-hashing model; lexical only, needs no download or credentials.
    Hashing { dimensions: usize },
    /// Local sentence-transformer run through `fastembed`.
    #[serde(rename = "fastembed")]
    FastEmbed { model: String },
    /// Any OpenAI-compatible `/embeddings` endpoint.
    #[serde(rename = "openai")]
    OpenAI {
        base_url: String,
        model: String,
        dimensions: usize,
        /// Name of the environment variable holding the API key.
        api_key_env: String,
        timeout_secs: u64,
    },
}

impl Default for EmbeddingBackend {
    /// all-MiniLM-L6-v2 when the `fastembed` feature is enabled, hashing otherwise.
    fn default() -> Self {
        #[cfg(feature = "fastembed")]
        {
            Self::FastEmbed { model: crate::semantic::DEFAULT_FASTEMBED_MODEL.to_string() }
        }
        #[cfg(not(feature = "fastembed"))]
        {
            Self::Hashing { dimensions: HashingEmbeddingProvider::DEFAULT_DIMENSIONS }
        }
    }
}

impl EmbeddingBackend {
    /// Instantiate the provider described by this backend.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a required credential is missing,
    /// a parameter is invalid, or the backend was compiled out.
    pub fn build(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        match self {
            Self::Hashing { dimensions } => {
                Ok(Arc::new(HashingEmbeddingProvider::new(*dimensions)?))
            }
            #[cfg(feature = "fastembed")]
            Self::FastEmbed { model } => {
                Ok(Arc::new(crate::semantic::FastEmbedProvider::new(model)?))
            }
            #[cfg(not(feature = "fastembed"))]
            Self::FastEmbed { .. } => Err(RagError::Configuration(
                "the fastembed embedding backend requires the `fastembed` feature".into(),
            )),
            #[cfg(feature = "openai")]
            Self::OpenAI { base_url, model, dimensions, api_key_env, timeout_secs } => {
                let api_key = require_env(api_key_env)?;
                let provider = crate::openai::OpenAIEmbeddingProvider::new(api_key)?
                    .with_base_url(base_url)
                    .with_model(model)
                    .with_dimensions(*dimensions)
                    .with_timeout(Duration::from_secs(*timeout_secs));
                Ok(Arc::new(provider))
            }
            #[cfg(not(feature = "openai"))]
            Self::OpenAI { .. } => Err(RagError::Configuration(
                "the OpenAI embedding backend requires the `openai` feature".into(),
            )),
        }
    }
}

/// The supported generation backends and the parameters each one needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationBackend {
    /// Any OpenAI-compatible chat-completions endpoint (OpenRouter, vLLM, Ollama...).
    #[serde(rename = "openai_compatible")]
    OpenAICompatible {
        base_url: String,
        model: String,
        /// Name of the environment variable holding the API key.
        api_key_env: String,
        timeout_secs: u64,
    },
}

impl Default for GenerationBackend {
    fn default() -> Self {
        Self::OpenAICompatible {
            base_url: OPENROUTER_API_BASE.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GenerationBackend {
    /// Instantiate the generator described by this backend.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the API key variable is unset or
    /// the backend was compiled out.
    pub fn build(&self) -> Result<Arc<dyn Generator>> {
        match self {
            #[cfg(feature = "openai")]
            Self::OpenAICompatible { base_url, model, api_key_env, timeout_secs } => {
                let api_key = require_env(api_key_env)?;
                let generator =
                    crate::openai::OpenAICompatibleGenerator::new(api_key, base_url, model)?
                        .with_timeout(Duration::from_secs(*timeout_secs));
                Ok(Arc::new(generator))
            }
            #[cfg(not(feature = "openai"))]
            Self::OpenAICompatible { .. } => Err(RagError::Configuration(
                "the OpenAI-compatible generator requires the `openai` feature".into(),
            )),
        }
    }
}

#[cfg(feature = "openai")]
fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(RagError::Configuration(format!("{name} not found in environment variables"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_pipeline() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 4);
        assert_eq!(config.temperature, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn builder_rejects_zero_top_k_and_bad_temperature() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().temperature(3.5).build().is_err());
        assert!(RagConfig::builder().generation_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: RagConfig = serde_json::from_str(r#"{"chunk_size": 800}"#).unwrap();
        assert_eq!(config.chunk_size, 800);
        assert_eq!(config.chunk_overlap, 50);
    }

    #[test]
    fn sub_second_timeouts_are_kept_exactly() {
        let config = RagConfig::builder()
            .generation_timeout(Duration::from_millis(1500))
            .embedding_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(config.generation_timeout(), Duration::from_millis(1500));
        assert_eq!(config.embedding_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn timeouts_round_trip_as_fractional_seconds() {
        let config: RagConfig =
            serde_json::from_str(r#"{"generation_timeout_secs": 1.5}"#).unwrap();
        assert_eq!(config.generation_timeout, Duration::from_millis(1500));
        assert_eq!(config.embedding_timeout, Duration::from_secs(120));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["generation_timeout_secs"], 1.5);
        assert!(serde_json::from_str::<RagConfig>(r#"{"embedding_timeout_secs": -1}"#).is_err());
    }

    #[test]
    fn hashing_backend_builds_without_credentials() {
        let provider = EmbeddingBackend::Hashing { dimensions: 64 }.build().unwrap();
        assert_eq!(provider.dimensions(), 64);
    }

    #[test]
    fn backend_is_tagged_in_json() {
        let backend: EmbeddingBackend =
            serde_json::from_str(r#"{"type": "hashing", "dimensions": 128}"#).unwrap();
        assert_eq!(backend, EmbeddingBackend::Hashing { dimensions: 128 });
    }

    #[test]
    fn fastembed_backend_is_tagged_in_json() {
        let backend: EmbeddingBackend =
            serde_json::from_str(r#"{"type": "fastembed", "model": "all-MiniLM-L6-v2"}"#).unwrap();
        assert_eq!(backend, EmbeddingBackend::FastEmbed { model: "all-MiniLM-L6-v2".into() });
    }

    #[cfg(not(feature = "fastembed"))]
    #[test]
    fn fastembed_backend_without_feature_is_a_configuration_error() {
        let backend = EmbeddingBackend::FastEmbed { model: "all-MiniLM-L6-v2".into() };
        let err = backend.build().err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[cfg(feature = "fastembed")]
    #[test]
    fn unknown_fastembed_model_is_a_configuration_error() {
        let backend = EmbeddingBackend::FastEmbed { model: "word2vec".into() };
        let err = backend.build().err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[cfg(feature = "openai")]
    #[test]
    fn missing_generator_key_is_a_configuration_error() {
        let backend = GenerationBackend::OpenAICompatible {
            base_url: OPENROUTER_API_BASE.into(),
            model: DEFAULT_GENERATION_MODEL.into(),
            api_key_env: "DOCQA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            timeout_secs: 5,
        };
        let err = backend.build().err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
