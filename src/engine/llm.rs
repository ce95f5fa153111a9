//! LLM provider seam.
//!
//! The provider client itself is an external collaborator; [`LlmService`]
//! is the capability the engine depends on. [`OfflineSynthesizer`] is the
//! in-tree implementation used when no provider is configured: it produces
//! a deterministic digest of the evidence so the pipeline runs end to end
//! offline, and reports itself unavailable for the metrics endpoint.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Request parameters forwarded to the provider.
#[derive(Debug, Clone, Copy)]
pub struct LlmParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Response token budget.
    pub max_tokens: u32,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 2048,
        }
    }
}

/// Trait for LLM providers.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Provider name.
    fn name(&self) -> &'static str;

    /// Whether a real provider is reachable.
    fn is_available(&self) -> bool {
        true
    }

    /// Produces an answer for the prompt.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider call fails.
    async fn process_request(
        &self,
        prompt: &str,
        params: &LlmParams,
        metadata: &Value,
    ) -> Result<String>;
}

/// Deterministic provider-free synthesizer.
///
/// Extracts the evidence headers from the prompt and returns a structured
/// digest. Not a language model: the answer lists what was found and where,
/// so offline runs and tests stay meaningful.
#[derive(Debug, Default)]
pub struct OfflineSynthesizer;

impl OfflineSynthesizer {
    /// Creates the synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmService for OfflineSynthesizer {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn process_request(
        &self,
        prompt: &str,
        _params: &LlmParams,
        _metadata: &Value,
    ) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(EngineError::Synthesis {
                reason: "empty prompt".to_string(),
            }
            .into());
        }

        let question = prompt
            .split("## Question")
            .nth(1)
            .map(|tail| tail.lines().find(|l| !l.trim().is_empty()).unwrap_or(""))
            .unwrap_or("")
            .trim()
            .to_string();

        let evidence: Vec<&str> = prompt
            .lines()
            .filter(|line| line.starts_with("### Snippet") || line.starts_with("### Article"))
            .collect();

        let mut answer = String::new();
        if question.is_empty() {
            answer.push_str("No answerable question was provided.\n");
        } else {
            answer.push_str(&format!("Question: {question}\n"));
        }
        if evidence.is_empty() {
            answer.push_str(
                "No code evidence was retrieved for this query; the index may be empty or the \
                 query too far from the indexed repositories.\n",
            );
        } else {
            answer.push_str("Evidence consulted:\n");
            for line in evidence {
                answer.push_str(&format!(
                    "- {}\n",
                    line.trim_start_matches('#').trim_start()
                ));
            }
            answer.push_str(
                "Review the referenced files and line ranges above; no language model was \
                 available to synthesize further.\n",
            );
        }
        Ok(answer)
    }
}
