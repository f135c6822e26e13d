pub mod ollama;

pub use ollama::OllamaClient;

use crate::Result;

/// A backend that turns text into fixed-dimension embedding vectors.
///
/// Implementations are blocking; callers batching large ingestions drive
/// them from worker contexts. Errors surface as-is to the caller, which
/// owns any retry policy.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model, for logging and metadata.
    fn model_name(&self) -> &str;

    /// Dimension every returned vector is guaranteed to have.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, preserving order. The result has exactly
    /// one vector per input text.
    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_many(&texts)?;
        vectors.pop().ok_or_else(|| {
            crate::CourseDocsError::Embedding("provider returned no embedding".to_string())
        })
    }
}
