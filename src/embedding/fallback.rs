//! Hash-based embedder for provider-free operation.
//!
//! Produces deterministic pseudo-embeddings from lexical features of code:
//! identifier tokens (with camelCase / snake_case splitting), plus character
//! trigrams for fuzzy matching. Similarity reflects token overlap, not
//! semantics; a provider-backed [`super::Embedder`] replaces this for true
//! semantic search.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::Result;
use crate::embedding::Embedder;

/// Deterministic lexical embedder.
///
/// # Examples
///
/// ```
/// use repolens::embedding::{Embedder, HashEmbedder};
///
/// let embedder = HashEmbedder::new(128);
/// let a = embedder.embed("getUserById").unwrap();
/// let b = embedder.embed("getUserById").unwrap();
/// assert_eq!(a, b);
/// ```
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a hash embedder with the given dimensions.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_str(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Splits source text into lowercase identifier sub-tokens.
    ///
    /// `getUserById` → `get`, `user`, `by`, `id`; `MAX_RETRIES` → `max`,
    /// `retries`. Punctuation separates tokens.
    fn tokenize(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut prev_lower = false;

        for c in text.chars() {
            if c.is_alphanumeric() {
                // camelCase boundary: lower→upper starts a new token.
                if c.is_uppercase() && prev_lower && !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                prev_lower = c.is_lowercase() || c.is_numeric();
                current.push(c.to_ascii_lowercase());
            } else {
                prev_lower = false;
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
        }
        if !current.is_empty() {
            tokens.push(current);
        }
        tokens
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        // Token-level hashing carries the primary signal.
        for token in Self::tokenize(text) {
            let hash = Self::hash_str(&token);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        // Character trigrams add a secondary fuzzy-match signal.
        let lowered: Vec<char> = text
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .filter(|c| c.is_alphanumeric())
            .collect();
        for window in lowered.windows(3) {
            let trigram: String = window.iter().collect();
            let hash = Self::hash_str(&trigram);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
            embedding[idx] += sign;
        }

        // Unit length so cosine similarity is a dot product.
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        use rayon::prelude::*;

        Ok(texts.par_iter().map(|text| self.generate(text)).collect())
    }
}
