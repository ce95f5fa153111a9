//! Name-keyed tool registry.
//!
//! Registration rejects duplicates and is bounded; lookup is concurrent-safe
//! behind a read lock. Construction is dependency-free: tools arrive as
//! `Arc<dyn AnalysisTool>` built elsewhere.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::error::ToolError;
use crate::mcp::tool::{AnalysisTool, ToolParameter};

/// Default registry capacity.
const DEFAULT_CAPACITY: usize = 64;

/// Serializable tool description for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// Declared parameters.
    pub parameters: Vec<ToolParameter>,
}

/// Bounded, concurrent-safe tool registry.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn AnalysisTool>>>,
    capacity: usize,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates a registry with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a registry bounded to `capacity` tools.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Duplicate`] for an already-registered name, and
    /// [`ToolError::InvalidParams`] when the registry is full.
    pub fn register(&self, tool: Arc<dyn AnalysisTool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().map_err(|_| ToolError::Permanent {
            name: name.clone(),
            reason: "registry lock poisoned".to_string(),
        })?;

        if tools.contains_key(&name) {
            return Err(ToolError::Duplicate { name });
        }
        if tools.len() >= self.capacity {
            return Err(ToolError::InvalidParams {
                name,
                reason: format!("registry full (capacity {})", self.capacity),
            });
        }
        tools.insert(name, tool);
        Ok(())
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AnalysisTool>> {
        self.tools.read().ok().and_then(|t| t.get(name).cloned())
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().map(|t| t.len()).unwrap_or(0)
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Describes every registered tool, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .read()
            .map(|tools| {
                tools
                    .values()
                    .map(|tool| ToolInfo {
                        name: tool.name().to_string(),
                        description: tool.description().to_string(),
                        parameters: tool.parameters(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tool::ToolResponse;
    use async_trait::async_trait;
    use serde_json::Value;

    struct NamedTool(&'static str);

    #[async_trait]
    impl AnalysisTool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }

        async fn execute(&self, _params: &Value) -> Result<ToolResponse, ToolError> {
            Ok(ToolResponse::ok("ok", Value::Null))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("call-path"))).unwrap();
        assert!(registry.get("call-path").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("call-path"))).unwrap();
        let result = registry.register(Arc::new(NamedTool("call-path")));
        assert!(matches!(result, Err(ToolError::Duplicate { .. })));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let registry = ToolRegistry::with_capacity(1);
        registry.register(Arc::new(NamedTool("one"))).unwrap();
        assert!(registry.register(Arc::new(NamedTool("two"))).is_err());
    }

    #[test]
    fn test_list_sorted() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("zeta"))).unwrap();
        registry.register(Arc::new(NamedTool("alpha"))).unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
