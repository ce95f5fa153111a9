//! Keyword retrieval over metadata text fields.
//!
//! Tokenizes the query, drops stop words and short tokens, and scores each
//! entry by weighted term counts across content, description, purpose
//! summary, and capabilities. Conceptual queries boost the descriptive
//! fields.

use crate::retrieval::{QueryType, RankedResult, RetrievalQuery, RetrievalStrategy};
use crate::store::StoredEntry;

/// Minimum token length kept after stop-word removal.
const MIN_TOKEN_LEN: usize = 3;
/// Boost applied to descriptive fields for conceptual queries.
const CONCEPTUAL_BOOST: f64 = 1.5;

/// Common stop words dropped from queries.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old",
    "see", "two", "way", "who", "does", "did", "this", "that", "with", "from", "they", "what",
    "when", "where", "which", "will", "would", "there", "their", "about", "into", "than", "them",
    "then", "some", "could", "should",
];

/// Term-count keyword retrieval.
#[derive(Debug, Default)]
pub struct KeywordStrategy;

impl KeywordStrategy {
    /// Creates the strategy.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Lowercased query terms with stop words and short tokens removed.
    fn terms(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(t))
            .map(str::to_string)
            .collect()
    }

    /// Occurrences of `term` in `text`, case-insensitively.
    #[allow(clippy::cast_precision_loss)]
    fn count(text: &str, term: &str) -> f64 {
        text.to_lowercase().matches(term).count() as f64
    }

    fn score_entry(entry: &StoredEntry, terms: &[String], boost: f64) -> f64 {
        let meta = &entry.metadata;
        let mut score = 0.0;
        for term in terms {
            score += 2.0 * Self::count(&meta.content, term);
            if let Some(description) = &meta.description {
                score += boost * Self::count(description, term);
            }
            if let Some(purpose) = &meta.purpose_summary {
                score += boost * 2.0 * Self::count(purpose, term);
            }
            for capability in &meta.capabilities {
                score += boost * Self::count(capability, term);
            }
        }
        score
    }
}

impl RetrievalStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn retrieve(
        &self,
        query: &RetrievalQuery,
        entries: &[StoredEntry],
        k: usize,
    ) -> Vec<RankedResult> {
        let terms = Self::terms(&query.text);
        if terms.is_empty() {
            return Vec::new();
        }

        let boost = if query.query_type == QueryType::Conceptual {
            CONCEPTUAL_BOOST
        } else {
            1.0
        };

        let mut results: Vec<RankedResult> = entries
            .iter()
            .filter_map(|entry| {
                let score = Self::score_entry(entry, &terms, boost);
                (score > 0.0).then(|| RankedResult {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, ChunkKind, EmbeddingMetadata};

    fn entry(id: &str, content: &str) -> StoredEntry {
        let chunk = Chunk::new(id, 0, ChunkKind::File, content.to_string(), 1, 1, "java");
        StoredEntry {
            id: id.to_string(),
            vector: vec![0.0; 64],
            metadata: EmbeddingMetadata::from_chunk(&chunk, "test", "ns"),
        }
    }

    #[test]
    fn test_term_extraction() {
        let terms = KeywordStrategy::terms("How does the BillingService compute totals?");
        assert!(terms.contains(&"billingservice".to_string()));
        assert!(terms.contains(&"compute".to_string()));
        assert!(terms.contains(&"totals".to_string()));
        // Stop words and short tokens dropped.
        assert!(!terms.contains(&"the".to_string()));
        assert!(!terms.contains(&"how".to_string()));
    }

    #[test]
    fn test_content_matches_rank_first() {
        let strategy = KeywordStrategy::new();
        let entries = vec![
            entry("none", "unrelated text"),
            entry("once", "billing code"),
            entry("twice", "billing and more billing"),
        ];
        let query = RetrievalQuery::new("billing", None);
        let results = strategy.retrieve(&query, &entries, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "twice");
        assert_eq!(results[1].id, "once");
    }

    #[test]
    fn test_descriptive_fields_boosted_for_conceptual() {
        let strategy = KeywordStrategy::new();

        let mut described = entry("described", "nothing relevant");
        described.metadata.purpose_summary = Some("billing totals".to_string());
        let content_only = entry("content", "billing");
        let entries = vec![described, content_only];

        // Conceptual: purpose hit scores 1.5 × 2 = 3.0 > content 2.0.
        let query = RetrievalQuery::new("explain billing", None);
        let results = strategy.retrieve(&query, &entries, 5);
        assert_eq!(results[0].id, "described");

        // Non-conceptual: purpose hit scores 2.0, tied with content 2.0.
        let query = RetrievalQuery::new("billing", None);
        let results = strategy.retrieve(&query, &entries, 5);
        assert!((results[0].score - results[1].score).abs() < 1e-9);
    }

    #[test]
    fn test_capability_matches() {
        let strategy = KeywordStrategy::new();
        let mut capable = entry("capable", "no match here");
        capable.metadata.capabilities = vec!["customer lookup".to_string()];
        let query = RetrievalQuery::new("customer", None);
        let results = strategy.retrieve(&query, &[capable], 5);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_stop_word_only_query() {
        let strategy = KeywordStrategy::new();
        let query = RetrievalQuery::new("how does the", None);
        assert!(strategy.retrieve(&query, &[entry("a", "how does the")], 5).is_empty());
    }

    #[test]
    fn test_top_k_truncation() {
        let strategy = KeywordStrategy::new();
        let entries: Vec<StoredEntry> = (0..10)
            .map(|i| entry(&format!("e{i}"), "billing"))
            .collect();
        let query = RetrievalQuery::new("billing", None);
        assert_eq!(strategy.retrieve(&query, &entries, 3).len(), 3);
    }
}
