//! Tool execution with retry, timeout, and bounded concurrency.
//!
//! Every attempt runs on a bounded worker pool (semaphore permits) under a
//! per-tool timeout. Failures are classified: transient failures and
//! timeouts retry with exponential backoff and jitter up to the attempt
//! cap; permanent failures return immediately. Submissions beyond the queue
//! depth are rejected with a retryable error (backpressure).
//!
//! Plan processing executes tools in ascending priority; tools sharing a
//! priority run concurrently and must be commutative. A required tool's
//! permanent failure aborts the remaining plan and flags the response as
//! partial.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{HybridConfig, RetryConfig};
use crate::error::ToolError;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::tool::{ToolResponse, resolve_params};

/// One planned tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTool {
    /// Registered tool name.
    pub tool_name: String,
    /// Caller parameters.
    #[serde(default)]
    pub params: Value,
    /// Ascending execution priority.
    #[serde(default)]
    pub priority: i32,
    /// Whether a permanent failure aborts the remaining plan.
    #[serde(default)]
    pub required: bool,
}

/// A tool-orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    /// The user query driving the plan.
    pub query: String,
    /// Ordered execution plan.
    #[serde(default)]
    pub execution_plan: Vec<PlannedTool>,
    /// Free-form context passed through to tools.
    #[serde(default)]
    pub context_data: Value,
}

/// Attempt lifecycle states.
///
/// `CREATED → RUNNING → (SUCCESS | FAILED_RETRYABLE → RUNNING |
/// FAILED_PERMANENT | TIMED_OUT)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptState {
    /// Attempt constructed, not yet scheduled.
    Created,
    /// Attempt executing.
    Running,
    /// Terminal: the tool returned a response.
    Success,
    /// Non-terminal: transient failure, will retry.
    FailedRetryable,
    /// Terminal: permanent failure or retries exhausted.
    FailedPermanent,
    /// Terminal: the final attempt timed out.
    TimedOut,
}

/// Outcome of one tool execution, including retry accounting.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    /// Tool name.
    pub tool_name: String,
    /// The final response; a synthesized failure when no attempt succeeded.
    pub response: ToolResponse,
    /// Attempts consumed (1 = no retries).
    pub attempts: u32,
    /// Terminal state of the last attempt.
    pub state: AttemptState,
}

impl ToolOutcome {
    /// Whether the execution ultimately succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self.state, AttemptState::Success)
    }
}

/// An orchestration response.
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    /// Summary answer.
    pub answer: String,
    /// Per-tool outcomes in execution order.
    pub tool_results: Vec<ToolOutcome>,
    /// Status and counts.
    pub metadata: Value,
}

/// The tool execution handler.
pub struct McpHandler {
    registry: Arc<ToolRegistry>,
    retry: RetryConfig,
    config: HybridConfig,
    workers: Arc<Semaphore>,
    queued: AtomicUsize,
}

impl McpHandler {
    /// Creates a handler over a registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, retry: RetryConfig, config: HybridConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.worker_pool_size));
        Self {
            registry,
            retry,
            config,
            workers,
            queued: AtomicUsize::new(0),
        }
    }

    /// The tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes one tool under the retry and timeout discipline.
    ///
    /// Never panics and never returns `Err`: failures are encoded in the
    /// outcome so plan processing can apply its own policy.
    pub async fn execute_tool(&self, name: &str, params: &Value) -> ToolOutcome {
        match self.try_execute(name, params).await {
            Ok(outcome) => outcome,
            Err(err) => ToolOutcome {
                tool_name: name.to_string(),
                response: ToolResponse::failed(&err.to_string()),
                attempts: 0,
                state: AttemptState::FailedPermanent,
            },
        }
    }

    async fn try_execute(&self, name: &str, params: &Value) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::Unknown {
                name: name.to_string(),
            })?;
        let resolved = resolve_params(tool.as_ref(), params)?;

        // Backpressure: reject when the queue is saturated.
        let depth = self.queued.fetch_add(1, Ordering::AcqRel);
        if depth >= self.config.max_queue_depth {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(ToolError::QueueFull { depth });
        }

        let permit = self.workers.acquire().await;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        let _permit = permit.map_err(|_| ToolError::Permanent {
            name: name.to_string(),
            reason: "worker pool closed".to_string(),
        })?;

        // Attempt lifecycle: CREATED → RUNNING → terminal, with
        // FAILED_RETRYABLE looping back into RUNNING below.
        let mut attempt: u32 = 0;
        loop {
            debug!(tool = name, attempt, "tool attempt");

            let result = tokio::time::timeout(self.config.tool_timeout, tool.execute(&resolved))
                .await
                .map_or_else(
                    |_elapsed| {
                        Err(ToolError::Timeout {
                            name: name.to_string(),
                            timeout_ms: u64::try_from(self.config.tool_timeout.as_millis())
                                .unwrap_or(u64::MAX),
                        })
                    },
                    |inner| inner,
                );

            attempt += 1;
            match result {
                Ok(response) => {
                    return Ok(ToolOutcome {
                        tool_name: name.to_string(),
                        response,
                        attempts: attempt,
                        state: AttemptState::Success,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.jittered_delay(attempt - 1);
                    warn!(tool = name, attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying tool");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    let terminal = if matches!(err, ToolError::Timeout { .. }) {
                        AttemptState::TimedOut
                    } else {
                        AttemptState::FailedPermanent
                    };
                    return Ok(ToolOutcome {
                        tool_name: name.to_string(),
                        response: ToolResponse::failed(&err.to_string()),
                        attempts: attempt,
                        state: terminal,
                    });
                }
            }
        }
    }

    /// Processes a request plan in ascending priority order.
    ///
    /// Tools with equal priority execute concurrently. A required tool's
    /// failure aborts everything after its priority group and flags the
    /// response as `partial_success`; non-required failures are recorded
    /// and execution continues.
    pub async fn process(&self, request: &McpRequest) -> McpResponse {
        let mut plan = request.execution_plan.clone();
        plan.sort_by_key(|p| p.priority);

        let mut outcomes: Vec<ToolOutcome> = Vec::new();
        let mut tool_errors: Vec<(String, String)> = Vec::new();
        let mut aborted = false;

        let mut index = 0;
        while index < plan.len() {
            let priority = plan[index].priority;
            let group_end = plan[index..]
                .iter()
                .position(|p| p.priority != priority)
                .map_or(plan.len(), |offset| index + offset);
            let group = &plan[index..group_end];

            let group_outcomes = futures_util::future::join_all(
                group
                    .iter()
                    .map(|planned| self.execute_tool(&planned.tool_name, &planned.params)),
            )
            .await;

            let mut required_failed = false;
            for (planned, outcome) in group.iter().zip(group_outcomes) {
                if !outcome.succeeded() {
                    tool_errors
                        .push((planned.tool_name.clone(), outcome.response.message.clone()));
                    if planned.required {
                        required_failed = true;
                    }
                }
                outcomes.push(outcome);
            }

            index = group_end;
            if required_failed {
                aborted = index < plan.len();
                break;
            }
        }

        let executed = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let status = if tool_errors.is_empty() {
            "success"
        } else if succeeded > 0 || aborted {
            "partial_success"
        } else {
            "error"
        };

        McpResponse {
            answer: format!(
                "Executed {succeeded}/{executed} tools for query: {}",
                request.query
            ),
            tool_results: outcomes,
            metadata: json!({
                "status": status,
                "planned": plan.len(),
                "executed": executed,
                "succeeded": succeeded,
                "aborted": aborted,
                "tool_errors": tool_errors
                    .iter()
                    .map(|(name, message)| json!({ "tool": name, "error": message }))
                    .collect::<Vec<_>>(),
            }),
        }
    }

    /// Backoff delay `base × 2^attempt × (1 ± jitter)`.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.retry.delay_for_attempt(attempt).as_secs_f64();
        let jitter = self.retry.jitter;
        let factor = if jitter > 0.0 {
            1.0 + rand::rng().random_range(-jitter..=jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::tool::{AnalysisTool, ToolParameter};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            jitter: 0.1,
        }
    }

    fn config() -> HybridConfig {
        HybridConfig {
            max_execution_time: Duration::from_secs(30),
            tool_timeout: Duration::from_millis(200),
            worker_pool_size: 64,
            max_queue_depth: 256,
        }
    }

    /// Fails transiently for the first `failures` calls, then succeeds.
    struct FlakyTool {
        failures: AtomicU32,
    }

    #[async_trait]
    impl AnalysisTool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "fails then succeeds"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }

        async fn execute(&self, _params: &Value) -> Result<ToolResponse, ToolError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n > 0).then(|| n - 1)
                })
                .is_ok()
            {
                return Err(ToolError::Transient {
                    name: "flaky".to_string(),
                    reason: "transient I/O".to_string(),
                });
            }
            Ok(ToolResponse::ok("done", json!({ "value": 42 })))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl AnalysisTool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails permanently"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }

        async fn execute(&self, _params: &Value) -> Result<ToolResponse, ToolError> {
            Err(ToolError::Permanent {
                name: "failing".to_string(),
                reason: "bad input".to_string(),
            })
        }
    }

    struct SlowTool;

    #[async_trait]
    impl AnalysisTool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps past the timeout"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }

        async fn execute(&self, _params: &Value) -> Result<ToolResponse, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolResponse::ok("never", Value::Null))
        }
    }

    struct OkTool(&'static str);

    #[async_trait]
    impl AnalysisTool for OkTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "succeeds"
        }

        fn parameters(&self) -> Vec<ToolParameter> {
            Vec::new()
        }

        async fn execute(&self, _params: &Value) -> Result<ToolResponse, ToolError> {
            Ok(ToolResponse::ok("ok", Value::Null))
        }
    }

    fn handler_with(tools: Vec<Arc<dyn AnalysisTool>>, max_attempts: u32) -> McpHandler {
        let registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            registry.register(tool).unwrap();
        }
        McpHandler::new(registry, retry(max_attempts), config())
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let handler = handler_with(
            vec![Arc::new(FlakyTool {
                failures: AtomicU32::new(1),
            })],
            3,
        );
        let outcome = handler.execute_tool("flaky", &json!({})).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.state, AttemptState::Success);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let handler = handler_with(vec![Arc::new(FailingTool)], 5);
        let outcome = handler.execute_tool("failing", &json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.state, AttemptState::FailedPermanent);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let handler = handler_with(
            vec![Arc::new(FlakyTool {
                failures: AtomicU32::new(100),
            })],
            2,
        );
        let outcome = handler.execute_tool("flaky", &json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.state, AttemptState::FailedPermanent);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let handler = handler_with(vec![Arc::new(SlowTool)], 1);
        let outcome = handler.execute_tool("slow", &json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.state, AttemptState::TimedOut);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let handler = handler_with(vec![], 1);
        let outcome = handler.execute_tool("nope", &json!({})).await;
        assert!(!outcome.succeeded());
        assert!(outcome.response.message.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_plan_priority_order() {
        let handler = handler_with(
            vec![Arc::new(OkTool("first")), Arc::new(OkTool("second"))],
            1,
        );
        let request = McpRequest {
            query: "q".to_string(),
            execution_plan: vec![
                PlannedTool {
                    tool_name: "second".to_string(),
                    params: json!({}),
                    priority: 2,
                    required: false,
                },
                PlannedTool {
                    tool_name: "first".to_string(),
                    params: json!({}),
                    priority: 1,
                    required: false,
                },
            ],
            context_data: Value::Null,
        };
        let response = handler.process(&request).await;
        let order: Vec<&str> = response
            .tool_results
            .iter()
            .map(|o| o.tool_name.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
        assert_eq!(response.metadata["status"], "success");
    }

    #[tokio::test]
    async fn test_required_failure_aborts_remaining() {
        let handler = handler_with(vec![Arc::new(FailingTool), Arc::new(OkTool("later"))], 1);
        let request = McpRequest {
            query: "q".to_string(),
            execution_plan: vec![
                PlannedTool {
                    tool_name: "failing".to_string(),
                    params: json!({}),
                    priority: 1,
                    required: true,
                },
                PlannedTool {
                    tool_name: "later".to_string(),
                    params: json!({}),
                    priority: 2,
                    required: false,
                },
            ],
            context_data: Value::Null,
        };
        let response = handler.process(&request).await;

        // The later tool never executed.
        assert_eq!(response.tool_results.len(), 1);
        assert_eq!(response.metadata["status"], "partial_success");
        assert_eq!(response.metadata["aborted"], true);
        let errors = response.metadata["tool_errors"].as_array().unwrap();
        assert_eq!(errors[0]["tool"], "failing");
    }

    #[tokio::test]
    async fn test_non_required_failure_continues() {
        let handler = handler_with(vec![Arc::new(FailingTool), Arc::new(OkTool("later"))], 1);
        let request = McpRequest {
            query: "q".to_string(),
            execution_plan: vec![
                PlannedTool {
                    tool_name: "failing".to_string(),
                    params: json!({}),
                    priority: 1,
                    required: false,
                },
                PlannedTool {
                    tool_name: "later".to_string(),
                    params: json!({}),
                    priority: 2,
                    required: false,
                },
            ],
            context_data: Value::Null,
        };
        let response = handler.process(&request).await;
        assert_eq!(response.tool_results.len(), 2);
        assert_eq!(response.metadata["status"], "partial_success");
        assert_eq!(response.metadata["aborted"], false);
    }

    #[tokio::test]
    async fn test_many_concurrent_executions() {
        let handler = Arc::new(handler_with(vec![Arc::new(OkTool("ok"))], 1));
        let tasks: Vec<_> = (0..60)
            .map(|_| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { handler.execute_tool("ok", &json!({})).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().succeeded());
        }
    }
}
