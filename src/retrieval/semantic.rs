//! Semantic retrieval over stored vectors.
//!
//! Scores candidates by cosine similarity against the query embedding with
//! a query-type-dependent threshold. Conceptual queries multiply the score
//! of described entries by a small boost, favouring documented code for
//! "how does X work" questions.

use crate::embedding::cosine_similarity;
use crate::retrieval::{QueryType, RankedResult, RetrievalQuery, RetrievalStrategy};
use crate::store::StoredEntry;

/// Minimum vector dimension accepted by the strategy.
const MIN_DIMENSIONS: usize = 64;
/// Score multiplier for described entries on conceptual queries.
const DESCRIPTION_BOOST: f64 = 1.1;

/// Cosine-similarity retrieval.
#[derive(Debug, Default)]
pub struct SemanticStrategy;

impl SemanticStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Similarity threshold for a query type.
    #[must_use]
    pub const fn threshold(query_type: QueryType) -> f64 {
        match query_type {
            QueryType::Conceptual => 0.55,
            QueryType::Implementation => 0.70,
            QueryType::Mixed => 0.65,
        }
    }
}

impl RetrievalStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn retrieve(
        &self,
        query: &RetrievalQuery,
        entries: &[StoredEntry],
        k: usize,
    ) -> Vec<RankedResult> {
        let Some(embedding) = &query.embedding else {
            return Vec::new();
        };
        if embedding.len() < MIN_DIMENSIONS {
            return Vec::new();
        }

        let threshold = Self::threshold(query.query_type);
        let conceptual = query.query_type == QueryType::Conceptual;

        let mut results: Vec<RankedResult> = entries
            .iter()
            .filter(|entry| entry.vector.len() >= MIN_DIMENSIONS)
            .filter_map(|entry| {
                let similarity = f64::from(cosine_similarity(embedding, &entry.vector));
                if similarity < threshold {
                    return None;
                }
                let described = entry
                    .metadata
                    .description
                    .as_deref()
                    .is_some_and(|d| !d.is_empty());
                let score = if conceptual && described {
                    similarity * DESCRIPTION_BOOST
                } else {
                    similarity
                };
                Some(RankedResult {
                    id: entry.id.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        results
    }
}
