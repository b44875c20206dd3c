use crate::errors::EngramResult;

/// Embedding generation provider. External to the memory core; any
/// conforming implementation may back it.
pub trait Embedder: Send + Sync {
    /// Embed a single text, returning a unit vector.
    fn embed(&self, text: &str) -> EngramResult<Vec<f32>>;

    /// Embed a batch of texts.
    fn embed_batch(&self, texts: &[String]) -> EngramResult<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Whether this provider is currently available.
    fn is_available(&self) -> bool {
        true
    }
}
