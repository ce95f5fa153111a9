//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use std::fmt::Write;

use crate::core::EmbeddingMetadata;
use crate::engine::WorkflowStep;
use crate::error::Error;
use crate::graph::GraphStats;
use crate::ingest::IngestReport;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats an error for the selected format.
#[must_use]
pub fn format_error(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => {
            serde_json::json!({ "status": "error", "error": err.to_string() }).to_string()
        }
    }
}

/// Formats an ingestion report.
#[must_use]
pub fn format_ingest_report(report: &IngestReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("Embedding generation\n");
            out.push_str("====================\n\n");
            let _ = writeln!(out, "  Namespace:            {}", report.namespace);
            let _ = writeln!(out, "  Files processed:      {}", report.files_processed);
            let _ = writeln!(out, "  Files skipped:        {}", report.files_skipped);
            let _ = writeln!(out, "  Chunks stored:        {}", report.chunks_stored);
            let _ = writeln!(out, "  Chunks changed:       {}", report.chunks_changed);
            let _ = writeln!(
                out,
                "  Skipped boilerplate:  {}",
                report.chunks_skipped_boilerplate
            );
            let _ = writeln!(out, "  Failed:               {}", report.chunks_failed);
            out
        }
    }
}

/// Formats call-graph build statistics.
#[must_use]
pub fn format_graph_stats(stats: &GraphStats, cache_path: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "classes": stats.classes,
            "methods": stats.methods,
            "edges": stats.edges,
            "cache": cache_path,
        })
        .to_string(),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("Knowledge graph\n");
            out.push_str("===============\n\n");
            let _ = writeln!(out, "  Classes:  {}", stats.classes);
            let _ = writeln!(out, "  Methods:  {}", stats.methods);
            let _ = writeln!(out, "  Edges:    {}", stats.edges);
            let _ = writeln!(out, "  Cache:    {cache_path}");
            out
        }
    }
}

/// Formats stored chunks for `inspect`.
#[must_use]
pub fn format_inspect(
    filepath: &str,
    entries: &[(String, EmbeddingMetadata)],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "filepath": filepath,
            "chunks": entries
                .iter()
                .map(|(id, meta)| serde_json::json!({
                    "id": id,
                    "namespace": meta.repository_namespace,
                    "start_line": meta.start_line,
                    "end_line": meta.end_line,
                    "language": meta.language,
                }))
                .collect::<Vec<_>>(),
        })
        .to_string(),
        OutputFormat::Text => {
            if entries.is_empty() {
                return format!("No stored chunks match {filepath}\n");
            }
            let mut out = String::new();
            let _ = writeln!(out, "Chunks for {filepath}");
            for (id, meta) in entries {
                let _ = writeln!(
                    out,
                    "  {id}  [{}]  lines {}-{}  ({})",
                    meta.repository_namespace, meta.start_line, meta.end_line, meta.language
                );
            }
            out
        }
    }
}

/// Formats workflow edges for `analyze-workflow`.
#[must_use]
pub fn format_workflow(steps: &[WorkflowStep], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(steps).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Text => {
            if steps.is_empty() {
                return "No workflow edges found\n".to_string();
            }
            let mut out = String::new();
            let mut current_file = "";
            for step in steps {
                if step.source_file != current_file {
                    current_file = &step.source_file;
                    let _ = writeln!(out, "{current_file}:");
                }
                let _ = writeln!(
                    out,
                    "  {} --> {} ({:.2})",
                    step.from, step.to, step.confidence
                );
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Text);
    }

    #[test]
    fn test_format_error() {
        let err = Error::input("bad query");
        assert!(format_error(&err, OutputFormat::Text).contains("bad query"));
        let json = format_error(&err, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "error");
    }

    #[test]
    fn test_format_ingest_report() {
        let report = IngestReport {
            namespace: "repo".to_string(),
            files_processed: 3,
            ..IngestReport::default()
        };
        let text = format_ingest_report(&report, OutputFormat::Text);
        assert!(text.contains("Files processed:      3"));

        let json = format_ingest_report(&report, OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["files_processed"], 3);
    }

    #[test]
    fn test_format_inspect_empty() {
        let text = format_inspect("A.java", &[], OutputFormat::Text);
        assert!(text.contains("No stored chunks"));
    }
}
