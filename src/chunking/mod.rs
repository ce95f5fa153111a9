//! Deterministic partitioning of source files into line-addressable chunks.
//!
//! The chunker slides a fixed-size character window with configurable
//! overlap, tracks line ranges through the overlapping regions, attaches
//! neighbour context, and extracts log statements for JVM-family sources.
//! The boilerplate filter classifies chunks that should be skipped before
//! embedding.

mod boilerplate;
mod chunker;
mod language;

pub use boilerplate::BoilerplateFilter;
pub use chunker::{Chunker, extract_log_statements};
pub use language::{detect_language, is_jvm_family};
