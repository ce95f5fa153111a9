//! Embedding generation for semantic search.
//!
//! The [`Embedder`] trait abstracts the provider; the in-tree
//! [`HashEmbedder`] produces deterministic pseudo-embeddings so the pipeline
//! runs without a network provider. [`EmbeddingClient`] wraps any embedder
//! with retry, failure recording, and provider-side rate limiting.

mod client;
mod fallback;

pub use client::{EmbeddingClient, FailureLog, RateLimiter};
pub use fallback::HashEmbedder;

use crate::Result;

/// Default embedding dimensions.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`) to support parallel
/// embedding during ingestion. Transient provider failures should surface as
/// [`crate::error::EmbeddingError::Transient`] so the client can retry them.
///
/// # Examples
///
/// ```
/// use repolens::embedding::{Embedder, HashEmbedder, DEFAULT_DIMENSIONS};
///
/// let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
/// let embedding = embedder.embed("fn main() {}").unwrap();
/// assert_eq!(embedding.len(), DEFAULT_DIMENSIONS);
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts, output order equal to input
    /// order.
    ///
    /// The default implementation calls `embed` sequentially.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Creates the default embedder.
///
/// # Errors
///
/// Never fails for the hash embedder; kept fallible for provider-backed
/// implementations behind the same seam.
pub fn create_embedder(dimensions: usize) -> Result<Box<dyn Embedder>> {
    Ok(Box::new(HashEmbedder::new(dimensions)))
}

/// Computes cosine similarity between two vectors: `(a·b)/(‖a‖‖b‖)`.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude inputs.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
