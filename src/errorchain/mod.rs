//! Regex-based exception analysis over source text.
//!
//! Locates throw, catch, wrap, and log sites for an exception class under
//! the configured scan roots, detects handling anti-patterns, and combines
//! the findings with the call graph's hierarchy and propagation stages into
//! an [`ErrorChainResult`].

mod analyzer;
mod patterns;

pub use analyzer::{
    AnalysisFlags, AntiPatternReport, ErrorChainAnalyzer, ErrorChainResult, HandlingStrategy,
    SourceLocation, WrappingPattern,
};
pub use patterns::{CatchBlock, ExceptionPatterns, extract_catch_blocks};
