//! Embedding metadata and failure records.
//!
//! [`EmbeddingMetadata`] is the side-store entry owned by the vector store,
//! keyed by chunk identifier. [`EmbeddingFailure`] records texts that could
//! not be embedded, keyed by content hash, and is retained until cleared or
//! a later re-embedding succeeds.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::Chunk;

/// Maximum length of a failure text preview in characters.
const PREVIEW_MAX_CHARS: usize = 200;

/// Metadata stored alongside each vector, keyed by chunk identifier.
///
/// `repository_namespace` is always non-empty and equals the namespace the
/// vector was stored under; the store enforces this on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    /// Origin of the entry (e.g. the ingestion run or repository URL).
    pub source: String,
    /// Chunk kind (`file` or `chunk`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Relative path of the source file.
    pub file_path: String,
    /// 1-based first line covered.
    pub start_line: usize,
    /// 1-based last line covered.
    pub end_line: usize,
    /// The chunk content as embedded.
    pub content: String,
    /// Detected language.
    pub language: String,
    /// Namespace (repository partition) the vector lives in.
    pub repository_namespace: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional one-line purpose summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose_summary: Option<String>,
    /// Capabilities this code provides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    /// Usage examples.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usage_examples: Vec<String>,
}

impl EmbeddingMetadata {
    /// Builds metadata for a chunk under the given namespace.
    #[must_use]
    pub fn from_chunk(chunk: &Chunk, source: &str, namespace: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: chunk.kind.as_str().to_string(),
            file_path: chunk.file_path.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content.clone(),
            language: chunk.language.clone(),
            repository_namespace: namespace.to_string(),
            description: None,
            purpose_summary: None,
            capabilities: Vec::new(),
            usage_examples: Vec::new(),
        }
    }
}

/// Record of a text that failed to embed, keyed by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingFailure {
    /// Hash of the failed text.
    pub text_hash: String,
    /// Preview of the failed text (at most 200 characters).
    pub text_preview: String,
    /// Why the embedding failed.
    pub cause: String,
    /// Unix timestamp of the first failure.
    pub first_seen: i64,
    /// Number of failed attempts observed.
    pub attempts: u32,
}

impl EmbeddingFailure {
    /// Creates a failure record for the given text.
    #[must_use]
    pub fn new(text: &str, cause: &str) -> Self {
        Self {
            text_hash: content_hash(text),
            text_preview: truncate_preview(text),
            cause: cause.to_string(),
            first_seen: current_timestamp(),
            attempts: 1,
        }
    }

    /// Records one more failed attempt, keeping the original cause's
    /// first-seen timestamp and updating the cause text.
    pub fn record_attempt(&mut self, cause: &str) {
        self.attempts = self.attempts.saturating_add(1);
        self.cause = cause.to_string();
    }
}

/// Computes the stable content hash used to key failure records.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Truncates text to the preview limit on a grapheme boundary.
#[must_use]
pub fn truncate_preview(text: &str) -> String {
    let mut out = String::new();
    for (count, grapheme) in text.graphemes(true).enumerate() {
        if count >= PREVIEW_MAX_CHARS {
            break;
        }
        out.push_str(grapheme);
    }
    out
}

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChunkKind;

    #[test]
    fn test_metadata_from_chunk() {
        let chunk = Chunk::new(
            "src/A.java",
            0,
            ChunkKind::File,
            "class A {}".to_string(),
            1,
            1,
            "java",
        );
        let meta = EmbeddingMetadata::from_chunk(&chunk, "ingest", "repo-a");
        assert_eq!(meta.file_path, "src/A.java");
        assert_eq!(meta.kind, "file");
        assert_eq!(meta.repository_namespace, "repo-a");
        assert_eq!(meta.start_line, 1);
        assert!(meta.description.is_none());
    }

    #[test]
    fn test_metadata_type_field_name() {
        let chunk = Chunk::new("a", 0, ChunkKind::Chunk, "x".to_string(), 1, 1, "java");
        let meta = EmbeddingMetadata::from_chunk(&chunk, "s", "ns");
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"type\":\"chunk\""));
    }

    #[test]
    fn test_failure_preview_truncation() {
        let long = "x".repeat(500);
        let failure = EmbeddingFailure::new(&long, "empty result");
        assert_eq!(failure.text_preview.len(), 200);
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn test_failure_attempt_accumulation() {
        let mut failure = EmbeddingFailure::new("text", "503");
        let first_seen = failure.first_seen;
        failure.record_attempt("timeout");
        assert_eq!(failure.attempts, 2);
        assert_eq!(failure.cause, "timeout");
        assert_eq!(failure.first_seen, first_seen);
    }

    #[test]
    fn test_content_hash_stable() {
        assert_eq!(content_hash("hello"), content_hash("hello"));
        assert_ne!(content_hash("hello"), content_hash("world"));
    }

    #[test]
    fn test_truncate_preview_grapheme_safe() {
        let text = "é".repeat(300);
        let preview = truncate_preview(&text);
        assert_eq!(preview.chars().count(), 200);
    }
}
