//! Source-level exception analysis.
//!
//! Scans the configured source roots for throw, catch, wrap, and log sites
//! of one exception class, detects handling anti-patterns in catch bodies,
//! and assembles an [`ErrorChainResult`]. Results are cached per
//! `(exception class, flags)` when caching is enabled.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ErrorChainConfig;
use crate::error::Result;
use crate::errorchain::patterns::{CatchBlock, ExceptionPatterns, extract_catch_blocks, line_of};
use crate::graph::{GraphAnalyzer, PropagationChain, analyze_exception_propagation};

/// A source location inside the scan roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// File path (under a scan root).
    pub file: String,
    /// 1-based line.
    pub line: usize,
    /// The matched source line, trimmed.
    pub snippet: String,
}

/// One wrapper/wrapped pairing with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrappingPattern {
    /// The wrapping exception type.
    pub wrapper: String,
    /// The wrapped exception or cause identifier.
    pub wrapped: String,
    /// Occurrences observed.
    pub count: usize,
}

/// A detected anti-pattern with its fixed recommendation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AntiPatternReport {
    /// What the pattern is.
    #[serde(rename = "Description")]
    pub description: String,
    /// Why it hurts.
    #[serde(rename = "Impact")]
    pub impact: String,
    /// What to do instead.
    #[serde(rename = "Recommendation")]
    pub recommendation: String,
    /// Where it was found.
    #[serde(rename = "Locations")]
    pub locations: Vec<SourceLocation>,
}

/// A handling strategy observation derived from component naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlingStrategy {
    /// Component (file stem) holding the handler.
    pub component: String,
    /// Heuristic effectiveness: High, Medium, or Low.
    pub effectiveness: String,
    /// Handler location.
    pub location: SourceLocation,
}

/// Complete analysis result for one exception class.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorChainResult {
    /// The analyzed exception class.
    pub exception_class: String,
    /// Superclass chain up to the Throwable root.
    pub hierarchy: Vec<String>,
    /// Propagation chains from the call graph.
    pub propagation_chains: Vec<PropagationChain>,
    /// Wrapper/wrapped pairings with counts.
    pub wrapping_patterns: Vec<WrappingPattern>,
    /// Logging observations (`level` at `file:line`).
    pub logging_patterns: Vec<String>,
    /// Detected anti-patterns by name.
    pub anti_patterns: BTreeMap<String, AntiPatternReport>,
    /// Constructor message literals with counts.
    pub common_error_messages: BTreeMap<String, usize>,
    /// Handling strategies by component heuristic.
    pub handling_strategies: Vec<HandlingStrategy>,
    /// Throw sites.
    pub throw_locations: Vec<SourceLocation>,
    /// Catch sites.
    pub catch_locations: Vec<SourceLocation>,
    /// Free-form notes about the analysis run.
    pub analysis_notes: Vec<String>,
    /// Recommendations by title.
    pub recommendations: BTreeMap<String, String>,
}

/// Flags selecting optional analysis stages; part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalysisFlags {
    /// Include the exception hierarchy walk.
    pub include_hierarchy: bool,
    /// Include reverse-graph propagation chains.
    pub include_propagation: bool,
    /// Include anti-pattern detection.
    pub include_anti_patterns: bool,
}

impl Default for AnalysisFlags {
    fn default() -> Self {
        Self {
            include_hierarchy: true,
            include_propagation: true,
            include_anti_patterns: true,
        }
    }
}

/// The exception analyzer.
pub struct ErrorChainAnalyzer {
    config: ErrorChainConfig,
    cache: Mutex<HashMap<(String, AnalysisFlags), Arc<ErrorChainResult>>>,
}

impl ErrorChainAnalyzer {
    /// Creates an analyzer over the configured scan roots.
    #[must_use]
    pub fn new(config: ErrorChainConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Analyzes one exception class.
    ///
    /// The `graph` supplies the hierarchy and propagation stages; passing
    /// `None` skips them with a note.
    ///
    /// # Errors
    ///
    /// Returns an error when the site patterns cannot be compiled for the
    /// class name.
    pub fn analyze(
        &self,
        exception_class: &str,
        graph: Option<&GraphAnalyzer>,
        flags: AnalysisFlags,
    ) -> Result<Arc<ErrorChainResult>> {
        let cache_key = (exception_class.to_string(), flags);
        if self.config.cache_enabled
            && let Ok(cache) = self.cache.lock()
            && let Some(cached) = cache.get(&cache_key)
        {
            debug!(exception = exception_class, "error-chain cache hit");
            return Ok(Arc::clone(cached));
        }

        let result = Arc::new(self.analyze_uncached(exception_class, graph, flags)?);

        if self.config.cache_enabled
            && let Ok(mut cache) = self.cache.lock()
        {
            cache.insert(cache_key, Arc::clone(&result));
        }
        Ok(result)
    }

    /// Drops all cached results.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn analyze_uncached(
        &self,
        exception_class: &str,
        graph: Option<&GraphAnalyzer>,
        flags: AnalysisFlags,
    ) -> Result<ErrorChainResult> {
        let simple_name = exception_class
            .rsplit('.')
            .next()
            .unwrap_or(exception_class);
        let patterns = ExceptionPatterns::compile(simple_name)?;

        let mut result = ErrorChainResult {
            exception_class: exception_class.to_string(),
            ..ErrorChainResult::default()
        };

        let mut wrapping: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut files_scanned = 0usize;

        for file in self.source_files() {
            let Ok(content) = std::fs::read_to_string(&file) else {
                warn!(file = %file.display(), "skipping unreadable source file");
                continue;
            };
            files_scanned += 1;
            let display = file.display().to_string();

            self.scan_sites(&patterns, &content, &display, &mut result, &mut wrapping);

            if flags.include_anti_patterns {
                let blocks = extract_catch_blocks(&content);
                collect_anti_patterns(&blocks, &display, &mut result.anti_patterns);
            }
        }

        result.wrapping_patterns = wrapping
            .into_iter()
            .map(|((wrapper, wrapped), count)| WrappingPattern {
                wrapper,
                wrapped,
                count,
            })
            .collect();

        result.handling_strategies = result
            .catch_locations
            .iter()
            .map(|location| HandlingStrategy {
                component: component_of(&location.file),
                effectiveness: effectiveness_of(&location.file).to_string(),
                location: location.clone(),
            })
            .collect();

        match graph {
            Some(analyzer) => {
                if flags.include_hierarchy {
                    let node = analyzer.analyze_exception_hierarchy(exception_class);
                    result.hierarchy = node.hierarchy.clone();
                    result.analysis_notes.push(format!(
                        "{} exception ({})",
                        if node.checked { "checked" } else { "unchecked" },
                        exception_class
                    ));
                }
                if flags.include_propagation {
                    result.propagation_chains = analyze_exception_propagation(
                        analyzer,
                        exception_class,
                        self.config.max_propagation_depth,
                    );
                }
            }
            None => {
                result
                    .analysis_notes
                    .push("call graph unavailable; hierarchy and propagation skipped".to_string());
            }
        }

        result
            .analysis_notes
            .push(format!("scanned {files_scanned} source files"));
        build_recommendations(&mut result);

        Ok(result)
    }

    fn scan_sites(
        &self,
        patterns: &ExceptionPatterns,
        content: &str,
        file: &str,
        result: &mut ErrorChainResult,
        wrapping: &mut BTreeMap<(String, String), usize>,
    ) {
        for m in patterns.throw_site.find_iter(content) {
            result
                .throw_locations
                .push(location(content, file, m.start()));
        }
        for m in patterns.catch_site.find_iter(content) {
            result
                .catch_locations
                .push(location(content, file, m.start()));
        }
        for caps in patterns.wraps_into.captures_iter(content) {
            if let Some(wrapper) = caps.get(1) {
                let simple = result
                    .exception_class
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                // Self-constructions are wraps_from matches, not wrappers.
                if wrapper.as_str() != simple {
                    *wrapping
                        .entry((wrapper.as_str().to_string(), simple))
                        .or_insert(0) += 1;
                }
            }
        }
        for caps in patterns.wraps_from.captures_iter(content) {
            if let Some(wrapped) = caps.get(1) {
                let simple = result
                    .exception_class
                    .rsplit('.')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                *wrapping
                    .entry((simple, wrapped.as_str().to_string()))
                    .or_insert(0) += 1;
            }
        }
        for caps in patterns.log_site.captures_iter(content) {
            if let (Some(whole), Some(level)) = (caps.get(0), caps.get(1)) {
                result.logging_patterns.push(format!(
                    "{} at {}:{}",
                    level.as_str(),
                    file,
                    line_of(content, whole.start())
                ));
            }
        }
        for caps in patterns.message.captures_iter(content) {
            if let Some(message) = caps.get(1) {
                *result
                    .common_error_messages
                    .entry(message.as_str().to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// Java sources under the scan roots, deterministic order.
    fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .config
            .scan_paths
            .iter()
            .filter(|root| root.exists())
            .flat_map(|root| {
                WalkDir::new(root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(std::result::Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "java"))
                    .map(|e| e.path().to_path_buf())
                    .collect::<Vec<_>>()
            })
            .collect();
        files.sort();
        files
    }
}

fn location(content: &str, file: &str, offset: usize) -> SourceLocation {
    let line = line_of(content, offset);
    let snippet = content
        .lines()
        .nth(line - 1)
        .unwrap_or_default()
        .trim()
        .to_string();
    SourceLocation {
        file: file.to_string(),
        line,
        snippet,
    }
}

/// Component name heuristic: the file stem.
fn component_of(file: &str) -> String {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
        .to_string()
}

/// Effectiveness heuristic from component naming conventions.
fn effectiveness_of(file: &str) -> &'static str {
    let lowered = file.to_lowercase();
    if lowered.contains("controller") || lowered.contains("advice") {
        "High"
    } else if lowered.contains("service") {
        "Medium"
    } else if lowered.contains("repository") || lowered.contains("dao") {
        "Low"
    } else {
        "Unknown"
    }
}

/// Detects the six catch-body anti-patterns.
fn collect_anti_patterns(
    blocks: &[CatchBlock],
    file: &str,
    reports: &mut BTreeMap<String, AntiPatternReport>,
) {
    for block in blocks {
        let body = block.body.trim();
        let location = SourceLocation {
            file: file.to_string(),
            line: block.line,
            snippet: format!("catch ({} {})", block.exception_type, block.identifier),
        };

        if body.is_empty() {
            record(
                reports,
                "empty-catch",
                "Catch block contains only whitespace",
                "The exception disappears without a trace",
                "Handle the exception, rethrow it, or document why it is safe to ignore",
                &location,
            );
            // An empty body trivially satisfies the swallowed predicate too;
            // report only the stronger finding.
            continue;
        }

        let has_throw = body.contains("throw");
        let has_log = body.contains("log");
        let has_return = body.contains("return");
        if !has_throw && !has_log && !has_return {
            record(
                reports,
                "swallowed-exception",
                "Catch body neither rethrows, logs, nor returns",
                "Failures are silently converted into normal control flow",
                "Rethrow a domain exception or log with enough context to diagnose",
                &location,
            );
        }

        if block.exception_type == "Exception" || block.exception_type.ends_with(".Exception") {
            record(
                reports,
                "generic-catch",
                "Catches the generic Exception type",
                "Unrelated failures are handled by the same branch, masking bugs",
                "Catch the narrowest exception types the block can actually handle",
                &location,
            );
        }

        if is_log_only(body, &block.identifier) {
            record(
                reports,
                "catch-and-log-only",
                "Catch body only logs the bound exception",
                "The operation appears to succeed while its failure is buried in logs",
                "Rethrow after logging, or recover explicitly",
                &location,
            );
        }

        if body.contains(&format!("{}.printStackTrace()", block.identifier)) {
            record(
                reports,
                "print-stack-trace",
                "Catch body calls printStackTrace on the bound exception",
                "Stack traces bypass structured logging and are lost in production",
                "Log through the logging framework with the exception attached",
                &location,
            );
        }

        if body.contains("Thread.sleep(") {
            record(
                reports,
                "sleep-in-catch",
                "Catch body sleeps the thread",
                "Hides backoff policy in handlers and stalls request threads",
                "Move retries behind an explicit retry policy with bounded backoff",
                &location,
            );
        }
    }
}

/// True when every statement in the body is a logger invocation that
/// mentions the bound identifier.
fn is_log_only(body: &str, identifier: &str) -> bool {
    let statements: Vec<&str> = body
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    !statements.is_empty()
        && statements.iter().all(|statement| {
            (statement.starts_with("log.") || statement.starts_with("logger."))
                && statement.contains(identifier)
        })
}

fn record(
    reports: &mut BTreeMap<String, AntiPatternReport>,
    name: &str,
    description: &str,
    impact: &str,
    recommendation: &str,
    location: &SourceLocation,
) {
    reports
        .entry(name.to_string())
        .or_insert_with(|| AntiPatternReport {
            description: description.to_string(),
            impact: impact.to_string(),
            recommendation: recommendation.to_string(),
            locations: Vec::new(),
        })
        .locations
        .push(location.clone());
}

/// Derives result-level recommendations from the findings.
fn build_recommendations(result: &mut ErrorChainResult) {
    if !result.anti_patterns.is_empty() {
        result.recommendations.insert(
            "Fix handling anti-patterns".to_string(),
            format!(
                "{} anti-pattern kind(s) detected across {} location(s)",
                result.anti_patterns.len(),
                result
                    .anti_patterns
                    .values()
                    .map(|r| r.locations.len())
                    .sum::<usize>()
            ),
        );
    }
    if result.catch_locations.is_empty() && !result.throw_locations.is_empty() {
        result.recommendations.insert(
            "Add a handler".to_string(),
            format!(
                "{} is thrown but never caught inside the scanned roots",
                result.exception_class
            ),
        );
    }
    if result.wrapping_patterns.len() > 3 {
        result.recommendations.insert(
            "Consolidate wrapping".to_string(),
            "Multiple wrapper types obscure the original failure; standardize on one domain exception".to_string(),
        );
    }
}
