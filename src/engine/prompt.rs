//! Deterministic prompt assembly.
//!
//! Builds the LLM prompt from the fused evidence: knowledge articles, code
//! snippets with metadata and logs, workflow edges grouped by source file,
//! and knowledge-graph relationships, ending with the restated query and
//! the citation instruction. Identical inputs produce an identical prompt.

use std::collections::BTreeSet;
use std::fmt::Write;

use serde::Serialize;

/// Query substrings that switch on full-file content.
const FULL_FILE_TRIGGERS: &[&str] = &[
    "full file",
    "entire file",
    "complete file",
    "full context",
    "full path",
];

/// A retrieved code snippet with its metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CodeSnippet {
    /// Source file path.
    pub file_path: String,
    /// 1-based first line.
    pub start_line: usize,
    /// 1-based last line.
    pub end_line: usize,
    /// Snippet content.
    pub content: String,
    /// Language identifier.
    pub language: String,
    /// Retrieval relevance in `[0, 1]`.
    pub score: f64,
    /// Purpose summary, when available.
    pub purpose: Option<String>,
    /// Description, when available.
    pub description: Option<String>,
    /// Capabilities, when available.
    pub capabilities: Vec<String>,
    /// Log statements observed in the snippet.
    pub logs: Vec<String>,
    /// Full file content, when requested and available.
    pub full_file: Option<String>,
}

/// One workflow edge derived from runtime logging.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    /// File the edge was observed in.
    pub source_file: String,
    /// Edge origin.
    pub from: String,
    /// Edge target.
    pub to: String,
    /// Edge confidence in `[0, 1]`.
    pub confidence: f64,
    /// Pattern tag (log level or detected idiom).
    pub pattern: Option<String>,
}

/// One knowledge-graph relationship.
#[derive(Debug, Clone, Serialize)]
pub struct GraphRelationship {
    /// Origin entity.
    pub from: String,
    /// Relationship kind.
    pub relation: String,
    /// Target entity.
    pub to: String,
}

/// A knowledge-base article.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeArticle {
    /// Article title.
    pub title: String,
    /// Article body.
    pub content: String,
}

/// All prompt inputs.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    /// The user query.
    pub query: String,
    /// Knowledge articles.
    pub articles: Vec<KnowledgeArticle>,
    /// Retrieved snippets, best first.
    pub snippets: Vec<CodeSnippet>,
    /// Workflow edges.
    pub workflow: Vec<WorkflowStep>,
    /// Knowledge-graph relationships.
    pub relationships: Vec<GraphRelationship>,
    /// Force full-file content regardless of query triggers.
    pub include_full_files: bool,
}

/// Whether full-file content should be included for this request.
#[must_use]
pub fn wants_full_files(query: &str, explicit: bool) -> bool {
    if explicit {
        return true;
    }
    let lowered = query.to_lowercase();
    FULL_FILE_TRIGGERS.iter().any(|t| lowered.contains(t))
}

/// Builds the prompt.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn build_prompt(inputs: &PromptInputs) -> String {
    let mut out = String::new();
    let include_full = wants_full_files(&inputs.query, inputs.include_full_files);

    out.push_str(
        "You are a codebase assistant answering engineering questions about a large, \
         multi-repository system.\n\
         Rules:\n\
         - Ground every claim in the evidence below.\n\
         - Reference file paths and line numbers for every code statement.\n\
         - Say so plainly when the evidence does not answer the question.\n\n",
    );

    if !inputs.articles.is_empty() {
        out.push_str("## Knowledge articles\n\n");
        for (index, article) in inputs.articles.iter().enumerate() {
            let _ = writeln!(out, "### Article {}: {}", index + 1, article.title);
            out.push_str(&article.content);
            out.push_str("\n\n");
        }
    }

    if !inputs.snippets.is_empty() {
        out.push_str("## Code snippets\n\n");
        let mut full_files_emitted: BTreeSet<&str> = BTreeSet::new();
        for (index, snippet) in inputs.snippets.iter().enumerate() {
            let _ = writeln!(
                out,
                "### Snippet {} — {} (lines {}-{}, relevance {:.2})",
                index + 1,
                snippet.file_path,
                snippet.start_line,
                snippet.end_line,
                snippet.score
            );
            if let Some(purpose) = &snippet.purpose {
                let _ = writeln!(out, "Purpose: {purpose}");
            }
            if let Some(description) = &snippet.description {
                let _ = writeln!(out, "Description: {description}");
            }
            if !snippet.capabilities.is_empty() {
                let _ = writeln!(out, "Capabilities: {}", snippet.capabilities.join(", "));
            }
            if !snippet.logs.is_empty() {
                out.push_str("Log statements:\n");
                for log in &snippet.logs {
                    let _ = writeln!(out, "  - {log}");
                }
            }
            let _ = writeln!(out, "```{}", snippet.language);
            out.push_str(&snippet.content);
            if !snippet.content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");

            // Full-file content, once per file across snippets.
            if include_full
                && let Some(full) = &snippet.full_file
                && full_files_emitted.insert(snippet.file_path.as_str())
            {
                let _ = writeln!(out, "Full content of {}:", snippet.file_path);
                let _ = writeln!(out, "```{}", snippet.language);
                out.push_str(full);
                if !full.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```\n");
            }
            out.push('\n');
        }
    }

    if !inputs.workflow.is_empty() {
        out.push_str("## Workflow steps\n\n");
        let mut by_file: Vec<(&str, Vec<&WorkflowStep>)> = Vec::new();
        for step in &inputs.workflow {
            match by_file.iter_mut().find(|(file, _)| *file == step.source_file) {
                Some((_, steps)) => steps.push(step),
                None => by_file.push((step.source_file.as_str(), vec![step])),
            }
        }
        for (file, steps) in by_file {
            let _ = writeln!(out, "From {file}:");
            for step in steps {
                let arrow = if step.confidence >= 0.8 {
                    "-->"
                } else {
                    "-?->"
                };
                let tag = step
                    .pattern
                    .as_deref()
                    .map(|p| format!(" [{p}]"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  {} {arrow} {} (confidence {:.2}){tag}",
                    step.from, step.to, step.confidence
                );
            }
            out.push('\n');
        }
    }

    if !inputs.relationships.is_empty() {
        out.push_str("## Knowledge-graph relationships\n\n");
        for relationship in &inputs.relationships {
            let _ = writeln!(
                out,
                "- {} {} {}",
                relationship.from, relationship.relation, relationship.to
            );
        }
        out.push('\n');
    }

    out.push_str("## Question\n\n");
    out.push_str(&inputs.query);
    out.push_str(
        "\n\nAnswer the question using the evidence above. Reference file paths and line \
         numbers explicitly.\n",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(file: &str) -> CodeSnippet {
        CodeSnippet {
            file_path: file.to_string(),
            start_line: 10,
            end_line: 20,
            content: "class A {}".to_string(),
            language: "java".to_string(),
            score: 0.9,
            purpose: Some("billing".to_string()),
            description: None,
            capabilities: vec!["invoice".to_string()],
            logs: vec!["info: started".to_string()],
            full_file: Some("full content".to_string()),
        }
    }

    #[test]
    fn test_deterministic() {
        let inputs = PromptInputs {
            query: "how does billing work".to_string(),
            snippets: vec![snippet("src/A.java")],
            ..PromptInputs::default()
        };
        assert_eq!(build_prompt(&inputs), build_prompt(&inputs));
    }

    #[test]
    fn test_sections_present() {
        let inputs = PromptInputs {
            query: "how does billing work".to_string(),
            articles: vec![KnowledgeArticle {
                title: "Billing overview".to_string(),
                content: "The billing system ...".to_string(),
            }],
            snippets: vec![snippet("src/A.java")],
            workflow: vec![WorkflowStep {
                source_file: "src/A.java".to_string(),
                from: "started".to_string(),
                to: "billed".to_string(),
                confidence: 0.9,
                pattern: Some("info".to_string()),
            }],
            relationships: vec![GraphRelationship {
                from: "A.run".to_string(),
                relation: "calls".to_string(),
                to: "B.go".to_string(),
            }],
            include_full_files: false,
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("## Knowledge articles"));
        assert!(prompt.contains("Billing overview"));
        assert!(prompt.contains("## Code snippets"));
        assert!(prompt.contains("src/A.java (lines 10-20"));
        assert!(prompt.contains("Capabilities: invoice"));
        assert!(prompt.contains("info: started"));
        assert!(prompt.contains("## Workflow steps"));
        assert!(prompt.contains("started --> billed"));
        assert!(prompt.contains("[info]"));
        assert!(prompt.contains("## Knowledge-graph relationships"));
        assert!(prompt.contains("A.run calls B.go"));
        assert!(prompt.contains("## Question"));
        assert!(prompt.contains("how does billing work"));
        assert!(prompt.contains("file paths and line"));
        // No trigger, no explicit flag: full file not included.
        assert!(!prompt.contains("Full content of"));
    }

    #[test]
    fn test_full_file_triggers() {
        assert!(wants_full_files("show me the full file please", false));
        assert!(wants_full_files("ENTIRE FILE", false));
        assert!(wants_full_files("anything", true));
        assert!(!wants_full_files("just the snippet", false));
    }

    #[test]
    fn test_full_file_deduplicated() {
        let inputs = PromptInputs {
            query: "show the full file".to_string(),
            snippets: vec![snippet("src/A.java"), snippet("src/A.java")],
            ..PromptInputs::default()
        };
        let prompt = build_prompt(&inputs);
        assert_eq!(prompt.matches("Full content of src/A.java").count(), 1);
    }

    #[test]
    fn test_low_confidence_arrow() {
        let inputs = PromptInputs {
            query: "q".to_string(),
            workflow: vec![WorkflowStep {
                source_file: "f".to_string(),
                from: "a".to_string(),
                to: "b".to_string(),
                confidence: 0.4,
                pattern: None,
            }],
            ..PromptInputs::default()
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("a -?-> b"));
    }
}
