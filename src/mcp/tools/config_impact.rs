//! Configuration-impact analysis tool.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Value, json};
use walkdir::WalkDir;

use crate::config::ErrorChainConfig;
use crate::error::ToolError;
use crate::mcp::tool::{AnalysisTool, ToolParameter, ToolResponse, string_param};

/// Extensions scanned for configuration key usages.
const SCANNED_EXTENSIONS: &[&str] = &["java", "properties", "yaml", "yml", "xml"];

/// Finds every usage of a configuration key under the scan roots and
/// summarizes which components depend on it.
pub struct ConfigImpactTool {
    config: ErrorChainConfig,
}

impl ConfigImpactTool {
    /// Tool name in the registry.
    pub const NAME: &'static str = "config-impact";

    /// Creates the tool over the source scan roots.
    #[must_use]
    pub const fn new(config: ErrorChainConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AnalysisTool for ConfigImpactTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Locates every usage of a configuration key across sources and config files and \
         summarizes the components a change would impact"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "config_key",
            "string",
            "Configuration key, e.g. `billing.retry.max-attempts`",
        )]
    }

    async fn execute(&self, params: &Value) -> Result<ToolResponse, ToolError> {
        let key = string_param(Self::NAME, params, "config_key")?;
        if key.trim().is_empty() {
            return Err(ToolError::InvalidParams {
                name: Self::NAME.to_string(),
                reason: "config_key must be non-empty".to_string(),
            });
        }

        let mut usages: Vec<Value> = Vec::new();
        let mut components: BTreeMap<String, usize> = BTreeMap::new();

        for root in &self.config.scan_paths {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| {
                    e.path()
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| SCANNED_EXTENSIONS.contains(&ext))
                })
            {
                let Ok(content) = std::fs::read_to_string(entry.path()) else {
                    continue;
                };
                for (line_index, line) in content.lines().enumerate() {
                    if line.contains(&key) {
                        let file = entry.path().display().to_string();
                        let component = entry
                            .path()
                            .file_stem()
                            .and_then(|s| s.to_str())
                            .unwrap_or_default()
                            .to_string();
                        *components.entry(component).or_insert(0) += 1;
                        usages.push(json!({
                            "file": file,
                            "line": line_index + 1,
                            "snippet": line.trim(),
                        }));
                    }
                }
            }
        }

        if usages.is_empty() {
            return Ok(ToolResponse::not_found(&format!(
                "no usages of configuration key {key}"
            )));
        }

        Ok(ToolResponse::ok(
            &format!(
                "{key}: {} usage(s) across {} component(s)",
                usages.len(),
                components.len()
            ),
            json!({
                "config_key": key,
                "usages": usages,
                "impacted_components": components,
            }),
        ))
    }
}
