//! Call-path analysis tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{Error, ToolError};
use crate::graph::GraphAnalyzer;
use crate::mcp::tool::{AnalysisTool, ToolParameter, ToolResponse, string_param, usize_param};

/// Builds the bounded call graph rooted at a method, expanding dynamic
/// dispatch to concrete implementations.
pub struct CallPathTool {
    analyzer: Arc<GraphAnalyzer>,
    default_max_depth: usize,
}

impl CallPathTool {
    /// Tool name in the registry.
    pub const NAME: &'static str = "call-path";

    /// Creates the tool over a graph analyzer.
    #[must_use]
    pub const fn new(analyzer: Arc<GraphAnalyzer>, default_max_depth: usize) -> Self {
        Self {
            analyzer,
            default_max_depth,
        }
    }
}

#[async_trait]
impl AnalysisTool for CallPathTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Builds the method-level call graph rooted at a method, including concrete \
         implementations behind interfaces and abstract methods"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required(
                "method",
                "string",
                "Method path, `com.example.Foo.run` or the descriptor-qualified form",
            ),
            ToolParameter::optional(
                "max_depth",
                "integer",
                "Traversal depth bound",
                json!(self.default_max_depth),
            ),
        ]
    }

    async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError> {
        let method = string_param(Self::NAME, params, "method")?;
        let max_depth = usize_param(Self::NAME, params, "max_depth")?
            .unwrap_or(self.default_max_depth);

        match self.analyzer.analyze_method(&method, max_depth) {
            Ok(graph) => {
                let mut response = ToolResponse::ok(
                    &format!(
                        "call graph for {method}: {} nodes, {} edges",
                        graph.node_count(),
                        graph.edge_count()
                    ),
                    json!({
                        "root": graph.root,
                        "truncated": graph.truncated,
                        "nodes": graph.nodes.values().collect::<Vec<_>>(),
                        "edges": graph.edge_list(),
                    }),
                );
                if !self.analyzer.is_ready() {
                    response = response
                        .with_warning("call-graph initialization incomplete; results may be partial");
                }
                Ok(response)
            }
            // Not-found is a structured empty result, never a plan failure.
            Err(Error::Graph(crate::error::GraphError::MethodNotFound { method })) => {
                Ok(ToolResponse::not_found(&format!("method not found: {method}")))
            }
            Err(err) => Err(ToolError::Permanent {
                name: Self::NAME.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallPathConfig;
    use crate::graph::parse_class;
    use crate::graph::testkit::ClassBuilder;

    fn analyzer() -> Arc<GraphAnalyzer> {
        let analyzer = GraphAnalyzer::new(CallPathConfig {
            max_depth: 5,
            max_nodes: 100,
            include_libraries: false,
            base_package: "com.example".to_string(),
            class_roots: Vec::new(),
        });
        analyzer.index_class(
            parse_class(
                &ClassBuilder::new("com.example.A")
                    .method("run", "()V", |m| m.call("com.example.B", "go", "()V"))
                    .build(),
                "test",
            )
            .unwrap(),
        );
        analyzer.index_class(
            parse_class(
                &ClassBuilder::new("com.example.B")
                    .method("go", "()V", |m| m)
                    .build(),
                "test",
            )
            .unwrap(),
        );
        Arc::new(analyzer)
    }

    #[tokio::test]
    async fn test_builds_graph() {
        let tool = CallPathTool::new(analyzer(), 5);
        let response = tool
            .execute(&json!({ "method": "com.example.A.run", "max_depth": 5 }))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data["root"], "com.example.A.run");
        assert_eq!(response.data["edges"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_method_is_structured_empty() {
        let tool = CallPathTool::new(analyzer(), 5);
        let response = tool
            .execute(&json!({ "method": "com.example.Missing.run" }))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data["found"], false);
        assert!(!response.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let tool = CallPathTool::new(analyzer(), 5);
        let result = tool.execute(&json!({})).await;
        assert!(result.is_err());
    }
}
