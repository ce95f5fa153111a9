//! Boilerplate classification for chunks.
//!
//! Applied before embedding; a positive classification counts the chunk as
//! skipped boilerplate and no vector is generated. Classification failure
//! defaults to "not boilerplate" since embedding is the safer side of a
//! mistake.

use std::collections::HashMap;

use regex::Regex;

use crate::core::Chunk;

/// Per-language line patterns that qualify as boilerplate.
///
/// A chunk is boilerplate when every non-blank line matches one of its
/// language's patterns, or when it is a recognizable license header.
#[derive(Debug)]
pub struct BoilerplateFilter {
    line_rules: HashMap<&'static str, Vec<Regex>>,
    license_marker: Option<Regex>,
}

impl Default for BoilerplateFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BoilerplateFilter {
    /// Creates the filter with the built-in rule sets.
    ///
    /// Pattern compilation failures drop the affected rule rather than
    /// failing construction; a missing rule only widens what gets embedded.
    #[must_use]
    pub fn new() -> Self {
        let mut line_rules: HashMap<&'static str, Vec<Regex>> = HashMap::new();

        line_rules.insert(
            "java",
            compile(&[
                r"^\s*package\s+[\w.]+\s*;\s*$",
                r"^\s*import\s+(static\s+)?[\w.*]+\s*;\s*$",
                r"^\s*[{}]\s*;?\s*$",
                r"^\s*//.*$",
                r"^\s*/?\*+.*$",
                r"^\s*@\w+(\(.*\))?\s*$",
            ]),
        );
        line_rules.insert(
            "python",
            compile(&[
                r"^\s*import\s+[\w.]+(\s+as\s+\w+)?\s*$",
                r"^\s*from\s+[\w.]+\s+import\s+.*$",
                r"^\s*#.*$",
            ]),
        );
        line_rules.insert(
            "javascript",
            compile(&[
                r"^\s*import\s+.*$",
                r#"^\s*(const|let|var)\s+\w+\s*=\s*require\(.*\)\s*;?\s*$"#,
                r"^\s*[{}\[\]();,]*\s*$",
                r"^\s*//.*$",
            ]),
        );
        line_rules.insert(
            "typescript",
            compile(&[
                r"^\s*import\s+.*$",
                r"^\s*export\s*\{[^}]*\}\s*;?\s*$",
                r"^\s*[{}\[\]();,]*\s*$",
                r"^\s*//.*$",
            ]),
        );

        Self {
            line_rules,
            license_marker: Regex::new(
                r"(?i)\b(licensed under|apache license|mit license|all rights reserved)\b",
            )
            .ok(),
        }
    }

    /// Classifies a chunk as boilerplate.
    ///
    /// Fail-open: a chunk whose language has no rule set, or whose content
    /// cannot be assessed, is not boilerplate.
    #[must_use]
    pub fn is_boilerplate(&self, chunk: &Chunk) -> bool {
        let trimmed = chunk.content.trim();
        if trimmed.is_empty() {
            return true;
        }

        // License headers are boilerplate in any language when the chunk is
        // a leading comment block.
        if chunk.index == 0
            && let Some(marker) = &self.license_marker
            && is_comment_block(trimmed)
            && marker.is_match(trimmed)
        {
            return true;
        }

        let Some(rules) = self.line_rules.get(chunk.language.as_str()) else {
            return false;
        };

        chunk
            .content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .all(|line| rules.iter().any(|rule| rule.is_match(line)))
    }
}

/// Compiles a pattern list, silently dropping patterns that fail.
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Returns `true` when every line of the text is part of a comment.
fn is_comment_block(text: &str) -> bool {
    text.lines().all(|line| {
        let line = line.trim();
        line.is_empty()
            || line.starts_with("//")
            || line.starts_with("/*")
            || line.starts_with('*')
            || line.starts_with('#')
    })
}
