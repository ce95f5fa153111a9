//! Model Control Plane: tool registry, retry/timeout handler, and the
//! built-in analysis tools.
//!
//! Tools register by name; the handler executes them on a bounded worker
//! pool with per-tool timeouts and the standard retry policy, and processes
//! multi-tool plans in ascending priority order with required-failure
//! semantics.

mod handler;
mod registry;
mod tool;
pub mod tools;

pub use handler::{AttemptState, McpHandler, McpRequest, McpResponse, PlannedTool, ToolOutcome};
pub use registry::{ToolInfo, ToolRegistry};
pub use tool::{
    AnalysisTool, ToolParameter, ToolResponse, resolve_params, string_param, usize_param,
};
