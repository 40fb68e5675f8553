//! Local sentence-transformer embeddings via `fastembed` (ONNX Runtime).
//!
//! Models are downloaded on first use and cached. Only available with the
//! `fastembed` feature.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, error, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The default model: the 384-dimensional `all-MiniLM-L6-v2` sentence transformer.
pub const DEFAULT_FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// An [`EmbeddingProvider`] running a sentence-transformer model in-process.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FastEmbedProvider;
///
/// let provider = FastEmbedProvider::new("all-MiniLM-L6-v2")?;
/// let embedding = provider.embed("How long is the warranty?").await?;
/// ```
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load `model_name`, downloading it if it is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] for an unsupported model name and
    /// [`RagError::Embedding`] if the model cannot be loaded.
    pub fn new(model_name: &str) -> Result<Self> {
        let model_enum = parse_model(model_name)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model_enum).with_show_download_progress(false),
        )
        .map_err(|e| {
            error!(model = model_name, error = %e, "failed to load embedding model");
            RagError::embedding("fastembed", format!("failed to load {model_name}: {e}"))
        })?;

        // Detect dimensions from a test embedding
        let sample = model
            .embed(vec!["test"], None)
            .map_err(|e| RagError::embedding("fastembed", e.to_string()))?;
        let dimensions = sample.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(RagError::embedding("fastembed", "model produced an empty embedding"));
        }

        info!(model = model_name, dimensions, "loaded embedding model");
        Ok(Self { model: Arc::new(model), model_name: model_name.to_string(), dimensions })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn parse_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        other => Err(RagError::Configuration(format!(
            "unsupported fastembed model '{other}'; expected all-MiniLM-L6-v2, \
             bge-small-en-v1.5 or bge-base-en-v1.5"
        ))),
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::embedding("fastembed", "model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(RagError::embedding("fastembed", "cannot embed empty text"));
        }

        debug!(model = %self.model_name, batch_size = texts.len(), "embedding batch");

        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(owned, None))
            .await
            .map_err(|e| RagError::embedding("fastembed", format!("embedding task failed: {e}")))?
            .map_err(|e| {
                error!(model = %self.model_name, error = %e, "embedding failed");
                RagError::embedding("fastembed", e.to_string())
            })?;

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "fastembed"
    }
}
