//! Chunk representation.
//!
//! Chunks are contiguous, line-addressable slices of a source file produced
//! by the chunker. Each chunk carries its position within the original file,
//! overlap context from its neighbours, and any log statements found in its
//! line range. Chunks are consumed by the embedding client and are not
//! retained after their vector is stored.

use serde::{Deserialize, Serialize};

/// Whether a chunk covers a whole file or a window of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// The file fit in a single chunk.
    File,
    /// One window of a multi-chunk file.
    Chunk,
}

impl ChunkKind {
    /// Stable string form used in metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Chunk => "chunk",
        }
    }
}

/// A log statement extracted from a chunk's line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatement {
    /// 1-based line of the statement in the original file.
    pub line: usize,
    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// The raw argument text of the log call.
    pub message: String,
}

/// A contiguous slice of a source file used as the unit of embedding.
///
/// Identity is `file_path "#" index`; chunks covering the same file are
/// ordered by `start_line` and adjacent chunks overlap by the configured
/// overlap size.
///
/// # Examples
///
/// ```
/// use repolens::core::{Chunk, ChunkKind};
///
/// let chunk = Chunk::new(
///     "src/A.java",
///     0,
///     ChunkKind::File,
///     "class A {}".to_string(),
///     1,
///     1,
///     "java",
/// );
/// assert_eq!(chunk.id(), "src/A.java#0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Relative path of the source file.
    pub file_path: String,
    /// Ordinal index within the file (0-based).
    pub index: usize,
    /// Whether this chunk covers the whole file or a window of it.
    pub kind: ChunkKind,
    /// Chunk content.
    pub content: String,
    /// 1-based first line covered by this chunk.
    pub start_line: usize,
    /// 1-based last line covered by this chunk.
    pub end_line: usize,
    /// Detected language (`plaintext` when unrecognized).
    pub language: String,
    /// Trailing slice of the previous chunk, for context.
    pub context_before: String,
    /// Leading slice of the next chunk, for context.
    pub context_after: String,
    /// Log statements whose line falls inside `[start_line, end_line]`.
    pub logs: Vec<LogStatement>,
}

impl Chunk {
    /// Creates a new chunk with empty contexts and no logs.
    #[must_use]
    pub fn new(
        file_path: &str,
        index: usize,
        kind: ChunkKind,
        content: String,
        start_line: usize,
        end_line: usize,
        language: &str,
    ) -> Self {
        Self {
            file_path: file_path.to_string(),
            index,
            kind,
            content,
            start_line,
            end_line,
            language: language.to_string(),
            context_before: String::new(),
            context_after: String::new(),
            logs: Vec::new(),
        }
    }

    /// Returns the chunk identifier: `file_path "#" index`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}#{}", self.file_path, self.index)
    }

    /// Returns the chunk size in characters.
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Checks if the chunk content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Returns the number of lines covered by this chunk.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Checks whether a 1-based line falls inside this chunk's range.
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}
