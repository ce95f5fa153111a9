//! Error-chain analysis tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::errorchain::{AnalysisFlags, ErrorChainAnalyzer};
use crate::graph::GraphAnalyzer;
use crate::mcp::tool::{AnalysisTool, ToolParameter, ToolResponse, string_param};

/// Analyzes an exception class: sites, hierarchy, propagation chains,
/// anti-patterns, and recommendations.
pub struct ErrorChainTool {
    analyzer: Arc<ErrorChainAnalyzer>,
    graph: Arc<GraphAnalyzer>,
}

impl ErrorChainTool {
    /// Tool name in the registry.
    pub const NAME: &'static str = "error-chain";

    /// Creates the tool.
    #[must_use]
    pub const fn new(analyzer: Arc<ErrorChainAnalyzer>, graph: Arc<GraphAnalyzer>) -> Self {
        Self { analyzer, graph }
    }
}

#[async_trait]
impl AnalysisTool for ErrorChainTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Traces an exception class through the codebase: throw and catch sites, class \
         hierarchy, propagation chains, wrapping, logging, and handling anti-patterns"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("exception", "string", "Exception class name"),
            ToolParameter::optional(
                "include_propagation",
                "boolean",
                "Walk the reverse call graph for propagation chains",
                json!(true),
            ),
            ToolParameter::optional(
                "include_anti_patterns",
                "boolean",
                "Scan catch bodies for handling anti-patterns",
                json!(true),
            ),
        ]
    }

    async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError> {
        let exception = string_param(Self::NAME, params, "exception")?;
        let flags = AnalysisFlags {
            include_hierarchy: true,
            include_propagation: params
                .get("include_propagation")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            include_anti_patterns: params
                .get("include_anti_patterns")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        };

        let result = self
            .analyzer
            .analyze(&exception, Some(&self.graph), flags)
            .map_err(|err| ToolError::Permanent {
                name: Self::NAME.to_string(),
                reason: err.to_string(),
            })?;

        if result.throw_locations.is_empty() && result.catch_locations.is_empty() {
            return Ok(ToolResponse::not_found(&format!(
                "no throw or catch sites found for {exception}"
            )));
        }

        let data = serde_json::to_value(result.as_ref()).map_err(|err| ToolError::Permanent {
            name: Self::NAME.to_string(),
            reason: format!("serialization failed: {err}"),
        })?;

        Ok(ToolResponse::ok(
            &format!(
                "{exception}: {} throw site(s), {} catch site(s), {} anti-pattern kind(s)",
                result.throw_locations.len(),
                result.catch_locations.len(),
                result.anti_patterns.len()
            ),
            data,
        ))
    }
}
