//! Hybrid retrieval fusing semantic and keyword rankings.
//!
//! Fetches `2k` candidates from each strategy, merges the candidate sets,
//! and scores every candidate by `Σ strategy_weight × rank_score`, where
//! `rank_score = result_count − rank` within each strategy's list. Weights
//! depend on the query type. With only one signal available the hybrid
//! delegates to the matching single strategy.

use std::collections::HashMap;

use crate::retrieval::{
    KeywordStrategy, QueryType, RankedResult, RetrievalQuery, RetrievalStrategy, SemanticStrategy,
};
use crate::store::StoredEntry;

/// Rank-fusion retrieval over the semantic and keyword strategies.
#[derive(Debug, Default)]
pub struct HybridStrategy {
    semantic: SemanticStrategy,
    keyword: KeywordStrategy,
}

impl HybridStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            semantic: SemanticStrategy::new(),
            keyword: KeywordStrategy::new(),
        }
    }

    /// `(semantic, keyword)` fusion weights for a query type. The pair
    /// always sums to 1.0.
    #[must_use]
    pub const fn weights(query_type: QueryType) -> (f64, f64) {
        match query_type {
            QueryType::Conceptual => (0.8, 0.2),
            QueryType::Implementation => (0.6, 0.4),
            QueryType::Mixed => (0.7, 0.3),
        }
    }

    /// `rank_score = result_count − rank` contributions for one list.
    #[allow(clippy::cast_precision_loss)]
    fn accumulate(scores: &mut HashMap<String, f64>, results: &[RankedResult], weight: f64) {
        let count = results.len();
        for (rank, result) in results.iter().enumerate() {
            let rank_score = (count - rank) as f64;
            *scores.entry(result.id.clone()).or_insert(0.0) += weight * rank_score;
        }
    }
}

impl RetrievalStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn retrieve(
        &self,
        query: &RetrievalQuery,
        entries: &[StoredEntry],
        k: usize,
    ) -> Vec<RankedResult> {
        let has_text = !query.text.trim().is_empty();
        let has_embedding = query.embedding.is_some();

        // Single-signal queries delegate to the matching strategy.
        match (has_text, has_embedding) {
            (false, false) => return Vec::new(),
            (false, true) => return self.semantic.retrieve(query, entries, k),
            (true, false) => return self.keyword.retrieve(query, entries, k),
            (true, true) => {}
        }

        let fetch = k.saturating_mul(2).max(1);
        let semantic_results = self.semantic.retrieve(query, entries, fetch);
        let keyword_results = self.keyword.retrieve(query, entries, fetch);

        let (semantic_weight, keyword_weight) = Self::weights(query.query_type);

        let mut scores: HashMap<String, f64> = HashMap::new();
        Self::accumulate(&mut scores, &semantic_results, semantic_weight);
        Self::accumulate(&mut scores, &keyword_results, keyword_weight);

        let mut merged: Vec<RankedResult> = scores
            .into_iter()
            .map(|(id, score)| RankedResult { id, score })
            .collect();
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        merged.truncate(k);
        merged
    }
}
