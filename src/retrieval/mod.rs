//! Pluggable retrieval strategies with query-type-aware scoring.
//!
//! All strategies implement [`RetrievalStrategy`] and are held in a
//! name-keyed [`StrategyRegistry`] with concurrent-safe lookup, the same
//! registration pattern the tool registry uses.

mod hybrid;
mod keyword;
mod query;
mod semantic;

pub use hybrid::HybridStrategy;
pub use keyword::KeywordStrategy;
pub use query::{QueryType, classify_query};
pub use semantic::SemanticStrategy;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::store::StoredEntry;

/// A retrieval request: the query text, its optional embedding, and the
/// classified query type.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    /// The raw query text.
    pub text: String,
    /// Query embedding, when available.
    pub embedding: Option<Vec<f32>>,
    /// Classification label.
    pub query_type: QueryType,
}

impl RetrievalQuery {
    /// Builds a query, classifying the text.
    #[must_use]
    pub fn new(text: &str, embedding: Option<Vec<f32>>) -> Self {
        Self {
            text: text.to_string(),
            embedding,
            query_type: classify_query(text),
        }
    }
}

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    /// Chunk identifier.
    pub id: String,
    /// Strategy-specific score; higher is better.
    pub score: f64,
}

/// Trait for retrieval strategies.
///
/// Given fixed store state and a fixed query embedding, `retrieve` must be
/// deterministic across invocations.
pub trait RetrievalStrategy: Send + Sync {
    /// Strategy name used for registration and lookup.
    fn name(&self) -> &'static str;

    /// Returns up to `k` ranked identifiers, best first.
    fn retrieve(&self, query: &RetrievalQuery, entries: &[StoredEntry], k: usize)
    -> Vec<RankedResult>;
}

/// Name-keyed registry of retrieval strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn RetrievalStrategy>>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the three built-in strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(SemanticStrategy::new()));
        registry.register(Arc::new(KeywordStrategy::new()));
        registry.register(Arc::new(HybridStrategy::new()));
        registry
    }

    /// Registers a strategy, replacing any prior entry with the same name.
    pub fn register(&self, strategy: Arc<dyn RetrievalStrategy>) {
        if let Ok(mut map) = self.strategies.write() {
            map.insert(strategy.name().to_string(), strategy);
        }
    }

    /// Looks up a strategy by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn RetrievalStrategy>> {
        self.strategies
            .read()
            .ok()
            .and_then(|map| map.get(name).cloned())
    }

    /// Registered strategy names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .strategies
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
