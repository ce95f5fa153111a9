//! Cross-repository tracing tool.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::embedding::EmbeddingClient;
use crate::error::ToolError;
use crate::mcp::tool::{AnalysisTool, ToolParameter, ToolResponse, string_param, usize_param};
use crate::store::VectorStore;

/// Default hits returned per trace.
const DEFAULT_TOP_K: usize = 10;
/// Similarity floor for cross-repository matches.
const MIN_SIMILARITY: f32 = 0.3;

/// Traces a concept across repository namespaces by embedding the query
/// and searching the union of namespaces, grouping hits per repository.
pub struct CrossRepoTool {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingClient>,
}

impl CrossRepoTool {
    /// Tool name in the registry.
    pub const NAME: &'static str = "cross-repo";

    /// Creates the tool.
    #[must_use]
    pub const fn new(store: Arc<VectorStore>, embeddings: Arc<EmbeddingClient>) -> Self {
        Self { store, embeddings }
    }
}

#[async_trait]
impl AnalysisTool for CrossRepoTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Traces a concept across repository namespaces, grouping similar code per repository"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("query", "string", "What to trace across repositories"),
            ToolParameter::optional(
                "namespaces",
                "array",
                "Namespaces to search; all when absent",
                json!([]),
            ),
            ToolParameter::optional("top_k", "integer", "Maximum hits", json!(DEFAULT_TOP_K)),
        ]
    }

    async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError> {
        let query = string_param(Self::NAME, params, "query")?;
        let top_k = usize_param(Self::NAME, params, "top_k")?.unwrap_or(DEFAULT_TOP_K);
        let namespaces: Vec<String> = params
            .get("namespaces")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // Embedding failures here are transient from the caller's view:
        // the provider may recover on a later plan attempt.
        let embedding = self.embeddings.embed(&query).map_err(|err| {
            if err.is_retryable() {
                ToolError::Transient {
                    name: Self::NAME.to_string(),
                    reason: err.to_string(),
                }
            } else {
                ToolError::Permanent {
                    name: Self::NAME.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;

        let hits = self
            .store
            .find_similar(&embedding, top_k, MIN_SIMILARITY, &namespaces)
            .map_err(|err| ToolError::Permanent {
                name: Self::NAME.to_string(),
                reason: err.to_string(),
            })?;

        if hits.is_empty() {
            return Ok(ToolResponse::not_found(&format!(
                "no cross-repository matches for: {query}"
            )));
        }

        let mut by_namespace: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for hit in &hits {
            by_namespace
                .entry(hit.namespace.clone())
                .or_default()
                .push(json!({ "id": hit.id, "score": hit.score }));
        }

        Ok(ToolResponse::ok(
            &format!(
                "{} match(es) across {} repositories",
                hits.len(),
                by_namespace.len()
            ),
            json!({
                "query": query,
                "repositories": by_namespace,
            }),
        ))
    }
}
