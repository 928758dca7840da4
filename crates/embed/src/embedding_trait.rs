use async_trait::async_trait;
use ragstore_common::Result;

/// Text-to-vector adapter used by collections
///
/// Implementations must be deterministic for identical input under a fixed
/// model, return exactly one vector per input text, and give every vector
/// the same length. Failures are reported as `EmbeddingFailure`.
#[async_trait]
pub trait EmbeddingFunction: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Provider/model description (for logging)
    fn name(&self) -> &str;
}
