//! Text generation capability used to reformulate questions and write answers.

use async_trait::async_trait;

use crate::error::Result;

/// A text-generation backend.
///
/// The orchestrator awaits each call to completion (or to its timeout), so
/// implementations are free to use any transport underneath.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::Generator;
///
/// let text = generator.generate("Summarise: ...", 0.0).await?;
/// ```
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for `prompt` at the given sampling temperature.
    ///
    /// Failures (timeouts, quota, refusals) are reported as
    /// [`RagError::Generation`](crate::RagError::Generation).
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Short generator name used in logs and error messages.
    fn name(&self) -> &str;
}
