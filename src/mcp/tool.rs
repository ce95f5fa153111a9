//! Tool capability types.
//!
//! An analysis tool is a named capability with typed parameters and a
//! uniform [`ToolResponse`]. Implementations classify their failures as
//! transient or permanent through [`ToolError`] so the handler can apply
//! the retry policy; not-found conditions are structured empty responses,
//! not errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ToolError;

/// A declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    /// Parameter name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter type: `string`, `integer`, `boolean`, or `array`.
    #[serde(rename = "type")]
    pub param_type: String,
    /// Whether the parameter must be present.
    pub required: bool,
    /// Default applied when an optional parameter is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// A required parameter.
    #[must_use]
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type: param_type.to_string(),
            required: true,
            default: None,
        }
    }

    /// An optional parameter with a default.
    #[must_use]
    pub fn optional(name: &str, param_type: &str, description: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            param_type: param_type.to_string(),
            required: false,
            default: Some(default),
        }
    }
}

/// Uniform tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    /// Whether the tool produced a usable result.
    pub success: bool,
    /// Human-readable outcome summary.
    pub message: String,
    /// Structured payload.
    pub data: Value,
    /// Non-fatal observations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Errors accumulated along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ToolResponse {
    /// A successful response.
    #[must_use]
    pub fn ok(message: &str, data: Value) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A structured empty result for not-found conditions: successful, with
    /// a warning, so the enclosing plan continues.
    #[must_use]
    pub fn not_found(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: json!({ "found": false }),
            warnings: vec![message.to_string()],
            errors: Vec::new(),
        }
    }

    /// A failure response.
    #[must_use]
    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            data: Value::Null,
            warnings: Vec::new(),
            errors: vec![message.to_string()],
        }
    }

    /// Appends a warning.
    #[must_use]
    pub fn with_warning(mut self, warning: &str) -> Self {
        self.warnings.push(warning.to_string());
        self
    }
}

/// Trait for analysis tools.
///
/// Tools are registered by name in the [`crate::mcp::ToolRegistry`] and
/// executed by the handler under the shared retry and timeout discipline.
#[async_trait]
pub trait AnalysisTool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// What the tool does.
    fn description(&self) -> &str;

    /// Declared parameters.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Executes the tool against resolved parameters.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] classified as transient (retryable) or
    /// permanent.
    async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError>;
}

/// Merges defaults into the caller's parameters and verifies required ones.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] naming the first missing required
/// parameter.
pub fn resolve_params(tool: &dyn AnalysisTool, params: &Value) -> Result<Value, ToolError> {
    let mut resolved: Map<String, Value> = params.as_object().cloned().unwrap_or_default();

    for parameter in tool.parameters() {
        match resolved.get(&parameter.name) {
            Some(value) if !value.is_null() => {}
            _ => {
                if let Some(default) = parameter.default {
                    resolved.insert(parameter.name.clone(), default);
                } else if parameter.required {
                    return Err(ToolError::InvalidParams {
                        name: tool.name().to_string(),
                        reason: format!("missing required parameter: {}", parameter.name),
                    });
                }
            }
        }
    }

    Ok(Value::Object(resolved))
}

/// Reads a string parameter.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] when absent or not a string.
pub fn string_param(tool_name: &str, params: &Value, name: &str) -> Result<String, ToolError> {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidParams {
            name: tool_name.to_string(),
            reason: format!("parameter {name} must be a string"),
        })
}

/// Reads an integer parameter.
///
/// # Errors
///
/// Returns [`ToolError::InvalidParams`] when present but not an integer.
pub fn usize_param(
    tool_name: &str,
    params: &Value,
    name: &str,
) -> Result<Option<usize>, ToolError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(usize::try_from(v).unwrap_or(usize::MAX)))
            .ok_or_else(|| ToolError::InvalidParams {
                name: tool_name.to_string(),
                reason: format!("parameter {name} must be a non-negative integer"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl AnalysisTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes parameters"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            vec![
                ToolParameter::required("message", "string", "what to echo"),
                ToolParameter::optional("repeat", "integer", "times", json!(1)),
            ]
        }

        async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError> {
            Ok(ToolResponse::ok("echoed", params.clone()))
        }
    }

    #[test]
    fn test_resolve_params_fills_defaults() {
        let resolved = resolve_params(&EchoTool, &json!({ "message": "hi" })).unwrap();
        assert_eq!(resolved["message"], "hi");
        assert_eq!(resolved["repeat"], 1);
    }

    #[test]
    fn test_resolve_params_missing_required() {
        let result = resolve_params(&EchoTool, &json!({}));
        assert!(matches!(result, Err(ToolError::InvalidParams { .. })));
    }

    #[test]
    fn test_resolve_params_keeps_explicit_values() {
        let resolved =
            resolve_params(&EchoTool, &json!({ "message": "hi", "repeat": 3 })).unwrap();
        assert_eq!(resolved["repeat"], 3);
    }

    #[test]
    fn test_param_accessors() {
        let params = json!({ "name": "x", "depth": 4 });
        assert_eq!(string_param("t", &params, "name").unwrap(), "x");
        assert_eq!(usize_param("t", &params, "depth").unwrap(), Some(4));
        assert_eq!(usize_param("t", &params, "missing").unwrap(), None);
        assert!(string_param("t", &params, "depth").is_err());
    }

    #[test]
    fn test_response_constructors() {
        let ok = ToolResponse::ok("done", json!({ "k": 1 }));
        assert!(ok.success);
        assert!(ok.errors.is_empty());

        let not_found = ToolResponse::not_found("method not found");
        assert!(not_found.success);
        assert_eq!(not_found.data["found"], false);
        assert_eq!(not_found.warnings.len(), 1);

        let failed = ToolResponse::failed("boom");
        assert!(!failed.success);
        assert_eq!(failed.errors, vec!["boom"]);
    }
}
