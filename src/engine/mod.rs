//! Hybrid query engine.
//!
//! Answers a query by fusing pre-computed retrieval with dynamically
//! planned analysis tools: classify the query, retrieve ranked snippets,
//! plan the tool set the categories imply, execute the plan under the wall
//! time cap, synthesize through the LLM seam, and enrich the response with
//! calibrated confidence. Tool failures degrade, never abort: the engine
//! falls back to retrieval-only synthesis when every dynamic tool fails.

mod classifier;
mod confidence;
mod llm;
mod prompt;

pub use classifier::{HeuristicClassifier, QueryCategory, QueryClassifier};
pub use confidence::{
    ComponentScore, ConfidenceCalculator, ConfidenceExplanation, ConfidenceMetrics,
    ConfidenceRating, query_clarity,
};
pub use llm::{LlmParams, LlmService, OfflineSynthesizer};
pub use prompt::{
    CodeSnippet, GraphRelationship, KnowledgeArticle, PromptInputs, WorkflowStep, build_prompt,
    wants_full_files,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::chunking::{extract_log_statements, is_jvm_family};
use crate::config::HybridConfig;
use crate::core::EmbeddingMetadata;
use crate::embedding::{EmbeddingClient, cosine_similarity};
use crate::error::{EngineError, Result};
use crate::graph::GraphAnalyzer;
use crate::mcp::tools::{CallPathTool, ConfigImpactTool, CrossRepoTool, ErrorChainTool};
use crate::mcp::{McpHandler, McpRequest, McpResponse, PlannedTool, ToolOutcome};
use crate::retrieval::{RetrievalQuery, StrategyRegistry};
use crate::store::VectorStore;

/// Snippets retrieved per query.
const RETRIEVAL_TOP_K: usize = 10;
/// Relevance floor for counting a snippet as relevant evidence.
const RELEVANT_EVIDENCE_THRESHOLD: f64 = 0.5;

/// A retrieved snippet with its relevance and metadata.
#[derive(Debug, Clone)]
pub struct RetrievedSnippet {
    /// Chunk identifier.
    pub id: String,
    /// Relevance in `[0, 1]`.
    pub score: f64,
    /// The stored metadata.
    pub metadata: EmbeddingMetadata,
}

/// Options for an answer request.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Optional context type (e.g. a ticket kind) passed to tools.
    pub context_type: Option<String>,
    /// Optional context identifier.
    pub context_id: Option<String>,
    /// Force full-file content into the prompt.
    pub include_full_files: bool,
    /// Restrict retrieval to these namespaces; empty means all.
    pub namespaces: Vec<String>,
    /// Knowledge articles supplied by the (external) knowledge-base reader.
    pub articles: Vec<KnowledgeArticle>,
}

/// Source counts in an answer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChatSources {
    /// Knowledge articles consulted.
    pub articles: usize,
    /// Code snippets cited.
    pub code_snippets: usize,
    /// Knowledge-graph relationships included.
    pub relationships: usize,
    /// Workflow steps included.
    pub workflow_steps: usize,
}

/// A synthesized answer with confidence enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    /// The synthesized answer text.
    pub answer: String,
    /// Evidence source counts.
    pub sources: ChatSources,
    /// Wall time spent.
    pub processing_time_ms: u64,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Confidence rating bucket.
    pub confidence_rating: String,
    /// Per-component confidence explanation.
    pub confidence_explanation: ConfidenceExplanation,
}

/// Result of a hybrid query (tools + retrieval, no synthesis).
#[derive(Debug, Clone, Serialize)]
pub struct HybridQueryResult {
    /// The query.
    pub query: String,
    /// Whether every planned tool succeeded.
    pub success: bool,
    /// Tool responses by name.
    pub tool_responses: BTreeMap<String, Value>,
    /// Tool errors by name.
    pub tool_errors: BTreeMap<String, String>,
    /// Whether any dynamic tool failed or the plan timed out.
    pub fallback_used: bool,
    /// Knowledge-graph relationships related to the retrieved snippets.
    pub relationships: Vec<GraphRelationship>,
}

/// The hybrid query engine.
pub struct HybridQueryEngine {
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingClient>,
    strategies: StrategyRegistry,
    handler: Arc<McpHandler>,
    graph: Arc<GraphAnalyzer>,
    llm: Arc<dyn LlmService>,
    classifier: Box<dyn QueryClassifier>,
    calculator: ConfidenceCalculator,
    config: HybridConfig,
}

impl HybridQueryEngine {
    /// Creates the engine with the built-in strategies and the heuristic
    /// classifier.
    #[must_use]
    pub fn new(
        store: Arc<VectorStore>,
        embeddings: Arc<EmbeddingClient>,
        handler: Arc<McpHandler>,
        graph: Arc<GraphAnalyzer>,
        llm: Arc<dyn LlmService>,
        calculator: ConfidenceCalculator,
        config: HybridConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            strategies: StrategyRegistry::with_defaults(),
            handler,
            graph,
            llm,
            classifier: Box::new(HeuristicClassifier::new()),
            calculator,
            config,
        }
    }

    /// Substitutes a classifier behind the same plan schema.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Box<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The MCP handler (for the raw request endpoint).
    #[must_use]
    pub fn handler(&self) -> &McpHandler {
        &self.handler
    }

    /// Whether a real LLM provider is configured.
    #[must_use]
    pub fn llm_available(&self) -> bool {
        self.llm.is_available()
    }

    /// Classifies a query into plan categories.
    #[must_use]
    pub fn classify(&self, query: &str) -> Vec<QueryCategory> {
        self.classifier.classify(query)
    }

    /// Pre-computed retrieval: ranked snippets from the vector store.
    ///
    /// # Errors
    ///
    /// Returns an error when the store snapshot cannot be read.
    pub fn retrieve(&self, query: &str, namespaces: &[String]) -> Result<Vec<RetrievedSnippet>> {
        let embedding = match self.embeddings.embed(query) {
            Ok(vector) => Some(vector),
            Err(err) => {
                warn!(error = %err, "query embedding failed; keyword-only retrieval");
                None
            }
        };

        let entries = self.store.entries(namespaces)?;
        let retrieval_query = RetrievalQuery::new(query, embedding.clone());
        let Some(strategy) = self.strategies.get("hybrid") else {
            return Ok(Vec::new());
        };
        let ranked = strategy.retrieve(&retrieval_query, &entries, RETRIEVAL_TOP_K);

        let by_id: BTreeMap<&str, &crate::store::StoredEntry> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        Ok(ranked
            .into_iter()
            .filter_map(|result| {
                let entry = by_id.get(result.id.as_str())?;
                let score = embedding.as_ref().map_or(0.5, |q| {
                    f64::from(cosine_similarity(q, &entry.vector)).clamp(0.0, 1.0)
                });
                Some(RetrievedSnippet {
                    id: result.id,
                    score,
                    metadata: entry.metadata.clone(),
                })
            })
            .collect())
    }

    /// Plans the tool set for the classified categories.
    ///
    /// `code-location` plans nothing; the other categories plan their tool
    /// when a usable parameter hint exists in the query or, for
    /// cross-component queries, in the retrieved snippets.
    #[must_use]
    pub fn plan_for(
        &self,
        categories: &[QueryCategory],
        query: &str,
        snippets: &[RetrievedSnippet],
    ) -> Vec<PlannedTool> {
        let mut plan: Vec<PlannedTool> = Vec::new();

        if categories.contains(&QueryCategory::MethodBehavior) {
            if let Some(method) = method_hint(query) {
                plan.push(PlannedTool {
                    tool_name: CallPathTool::NAME.to_string(),
                    params: json!({ "method": method }),
                    priority: 1,
                    required: false,
                });
            } else {
                debug!("method-behavior query without a method hint; call-path skipped");
            }
        }

        let mut exception = exception_hint(query);
        if exception.is_none() && categories.contains(&QueryCategory::CrossComponent) {
            // Snippet-implied diagnosis for cross-component queries.
            exception = snippets
                .iter()
                .find_map(|snippet| exception_hint(&snippet.metadata.content));
        }
        if categories.contains(&QueryCategory::ErrorDiagnosis)
            || (categories.contains(&QueryCategory::CrossComponent) && exception.is_some())
        {
            if let Some(exception) = exception {
                plan.push(PlannedTool {
                    tool_name: ErrorChainTool::NAME.to_string(),
                    params: json!({ "exception": exception }),
                    priority: 1,
                    required: false,
                });
            } else {
                debug!("error-diagnosis query without an exception hint; error-chain skipped");
            }
        }

        if categories.contains(&QueryCategory::ConfigImpact) {
            if let Some(key) = config_key_hint(query) {
                plan.push(PlannedTool {
                    tool_name: ConfigImpactTool::NAME.to_string(),
                    params: json!({ "config_key": key }),
                    priority: 1,
                    required: false,
                });
            }
        }

        if categories.contains(&QueryCategory::CrossComponent) {
            plan.push(PlannedTool {
                tool_name: CrossRepoTool::NAME.to_string(),
                params: json!({ "query": query }),
                priority: 2,
                required: false,
            });
        }

        plan
    }

    /// Executes a plan under the wall-time cap.
    ///
    /// Returns the outcomes and whether the cap elapsed.
    async fn execute_plan(&self, request: &McpRequest) -> (Vec<ToolOutcome>, bool) {
        if request.execution_plan.is_empty() {
            return (Vec::new(), false);
        }
        match tokio::time::timeout(self.config.max_execution_time, self.handler.process(request))
            .await
        {
            Ok(response) => (response.tool_results, false),
            Err(_elapsed) => {
                warn!(
                    cap_secs = self.config.max_execution_time.as_secs(),
                    "tool plan exceeded the execution cap"
                );
                (Vec::new(), true)
            }
        }
    }

    /// Full answer pipeline for `/chat`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyQuery`] for a blank query and a
    /// synthesis error when the LLM seam fails.
    pub async fn answer(&self, query: &str, options: ChatOptions) -> Result<ChatAnswer> {
        let started = Instant::now();
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery.into());
        }

        let categories = self.classify(query);
        debug!(?categories, "query classified");

        let snippets = self.retrieve(query, &options.namespaces)?;
        let plan = self.plan_for(&categories, query, &snippets);
        let request = McpRequest {
            query: query.to_string(),
            execution_plan: plan,
            context_data: json!({
                "context_type": options.context_type,
                "context_id": options.context_id,
            }),
        };
        let (outcomes, timed_out) = self.execute_plan(&request).await;

        let failed_tools = outcomes.iter().filter(|o| !o.succeeded()).count();
        let fallback_used = timed_out || failed_tools > 0;
        if fallback_used && failed_tools == outcomes.len() {
            info!("all dynamic tools failed; synthesizing from retrieval alone");
        }

        let relationships = self.relationships_for(&snippets);
        let workflow = workflow_steps(&snippets);
        let prompt_inputs = PromptInputs {
            query: query.to_string(),
            articles: options.articles.clone(),
            snippets: snippets.iter().map(to_code_snippet).collect(),
            workflow,
            relationships,
            include_full_files: options.include_full_files,
        };
        let prompt = build_prompt(&prompt_inputs);

        let answer = self
            .llm
            .process_request(
                &prompt,
                &LlmParams::default(),
                &json!({ "categories": categories, "fallback_used": fallback_used }),
            )
            .await?;

        let metrics = self.metrics_for(query, &snippets, &outcomes);
        let score = self.calculator.score(&metrics);

        Ok(ChatAnswer {
            answer,
            sources: ChatSources {
                articles: prompt_inputs.articles.len(),
                code_snippets: prompt_inputs.snippets.len(),
                relationships: prompt_inputs.relationships.len(),
                workflow_steps: prompt_inputs.workflow.len(),
            },
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            confidence: score,
            confidence_rating: self.calculator.rating(score).as_str().to_string(),
            confidence_explanation: self.calculator.explanation(&metrics),
        })
    }

    /// Hybrid query for `/hybrid/query`: retrieval plus tools, no synthesis.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyQuery`] for a blank query.
    pub async fn hybrid_query(&self, query: &str) -> Result<HybridQueryResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery.into());
        }

        let categories = self.classify(query);
        let snippets = self.retrieve(query, &[])?;
        let plan = self.plan_for(&categories, query, &snippets);
        let request = McpRequest {
            query: query.to_string(),
            execution_plan: plan,
            context_data: Value::Null,
        };
        let (outcomes, timed_out) = self.execute_plan(&request).await;

        let mut tool_responses = BTreeMap::new();
        let mut tool_errors = BTreeMap::new();
        for outcome in &outcomes {
            if outcome.succeeded() {
                tool_responses.insert(
                    outcome.tool_name.clone(),
                    serde_json::to_value(&outcome.response).unwrap_or(Value::Null),
                );
            } else {
                tool_errors.insert(outcome.tool_name.clone(), outcome.response.message.clone());
            }
        }

        Ok(HybridQueryResult {
            query: query.to_string(),
            success: tool_errors.is_empty() && !timed_out,
            fallback_used: timed_out || !tool_errors.is_empty(),
            relationships: self.relationships_for(&snippets),
            tool_responses,
            tool_errors,
        })
    }

    /// Classifies, plans, and executes for the raw MCP query endpoint.
    pub async fn mcp_query(&self, query: &str) -> Result<McpResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::EmptyQuery.into());
        }
        let categories = self.classify(query);
        let snippets = self.retrieve(query, &[])?;
        let request = McpRequest {
            query: query.to_string(),
            execution_plan: self.plan_for(&categories, query, &snippets),
            context_data: Value::Null,
        };
        Ok(self.handler.process(&request).await)
    }

    /// Knowledge-graph relationships for the classes behind the snippets.
    fn relationships_for(&self, snippets: &[RetrievedSnippet]) -> Vec<GraphRelationship> {
        let mut out = Vec::new();
        let mut seen_classes = std::collections::BTreeSet::new();
        for snippet in snippets {
            let Some(stem) = std::path::Path::new(&snippet.metadata.file_path)
                .file_stem()
                .and_then(|s| s.to_str())
            else {
                continue;
            };
            if !seen_classes.insert(stem.to_string()) {
                continue;
            }
            // Edges whose caller belongs to the snippet's class.
            for descriptor in self.graph.types() {
                if !descriptor.class_name.ends_with(&format!(".{stem}"))
                    && descriptor.class_name != *stem
                {
                    continue;
                }
                for method in &descriptor.methods {
                    let key = crate::graph::method_key(&descriptor.class_name, &method.name);
                    for callee in self.graph.callees_of(&key) {
                        out.push(GraphRelationship {
                            from: key.clone(),
                            relation: "calls".to_string(),
                            to: callee,
                        });
                        if out.len() >= 20 {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }

    /// Assembles confidence metrics from retrieval and tool outcomes.
    fn metrics_for(
        &self,
        query: &str,
        snippets: &[RetrievedSnippet],
        outcomes: &[ToolOutcome],
    ) -> ConfidenceMetrics {
        #[allow(clippy::cast_precision_loss)]
        let average = if snippets.is_empty() {
            0.0
        } else {
            snippets.iter().map(|s| s.score).sum::<f64>() / snippets.len() as f64
        };

        ConfidenceMetrics {
            vector_search_score: average,
            tool_execution_count: outcomes.len(),
            successful_tool_executions: outcomes.iter().filter(|o| o.succeeded()).count(),
            evidence_count: snippets.len(),
            relevant_evidence_count: snippets
                .iter()
                .filter(|s| s.score >= RELEVANT_EVIDENCE_THRESHOLD)
                .count(),
            average_evidence_quality: average,
            query_clarity: query_clarity(query),
        }
    }
}

/// Converts a retrieved snippet into its prompt form, re-extracting log
/// statements from the stored content for JVM sources.
fn to_code_snippet(snippet: &RetrievedSnippet) -> CodeSnippet {
    let meta = &snippet.metadata;
    let logs = if is_jvm_family(&meta.language) {
        extract_log_statements(&meta.content)
            .into_iter()
            .map(|log| format!("{}: {}", log.level, log.message))
            .collect()
    } else {
        Vec::new()
    };

    CodeSnippet {
        file_path: meta.file_path.clone(),
        start_line: meta.start_line,
        end_line: meta.end_line,
        content: meta.content.clone(),
        language: meta.language.clone(),
        score: snippet.score,
        purpose: meta.purpose_summary.clone(),
        description: meta.description.clone(),
        capabilities: meta.capabilities.clone(),
        logs,
        // A whole-file chunk carries the file content.
        full_file: (meta.kind == "file").then(|| meta.content.clone()),
    }
}

/// Workflow edges between consecutive log statements of each snippet file.
fn workflow_steps(snippets: &[RetrievedSnippet]) -> Vec<WorkflowStep> {
    let mut steps = Vec::new();
    for snippet in snippets {
        if !is_jvm_family(&snippet.metadata.language) {
            continue;
        }
        let logs = extract_log_statements(&snippet.metadata.content);
        for pair in logs.windows(2) {
            steps.push(WorkflowStep {
                source_file: snippet.metadata.file_path.clone(),
                from: pair[0].message.clone(),
                to: pair[1].message.clone(),
                confidence: if pair[0].level == pair[1].level { 0.9 } else { 0.6 },
                pattern: Some(format!("{}->{}", pair[0].level, pair[1].level)),
            });
        }
    }
    steps
}

/// `Class.method` hint in a query.
fn method_hint(query: &str) -> Option<String> {
    let pattern = Regex::new(r"\b([A-Z]\w*(?:\.[A-Z]\w*)*\.[a-z]\w*)\b").ok()?;
    pattern
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `FooException` / `FooError` hint in text.
fn exception_hint(text: &str) -> Option<String> {
    let pattern = Regex::new(r"\b((?:[a-z][\w]*\.)*[A-Z]\w*(?:Exception|Error))\b").ok()?;
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Dotted configuration-key hint in a query.
fn config_key_hint(query: &str) -> Option<String> {
    let pattern = Regex::new(r"\b([a-z][\w-]*(?:\.[a-z][\w-]*)+)\b").ok()?;
    pattern
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_hint() {
        assert_eq!(
            method_hint("How does CustomerService.findById work?"),
            Some("CustomerService.findById".to_string())
        );
        assert_eq!(
            method_hint("what does com.example.Foo.run do"),
            // The package prefix is lowercase; the hint starts at the class.
            Some("Foo.run".to_string())
        );
        assert_eq!(method_hint("no hint here"), None);
    }

    #[test]
    fn test_exception_hint() {
        assert_eq!(
            exception_hint("why is FooException thrown"),
            Some("FooException".to_string())
        );
        assert_eq!(
            exception_hint("com.example.BarError appears in logs"),
            Some("com.example.BarError".to_string())
        );
        assert_eq!(exception_hint("no errors here"), None);
    }

    #[test]
    fn test_config_key_hint() {
        assert_eq!(
            config_key_hint("what happens if I change billing.retry.max-attempts"),
            Some("billing.retry.max-attempts".to_string())
        );
        assert_eq!(config_key_hint("no key"), None);
    }
}
