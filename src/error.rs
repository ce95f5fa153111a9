//! Error types for repolens operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! all subsystems: vector store, chunking, embedding, graph analysis, tool
//! execution, and the query engine.
//!
//! The taxonomy follows the propagation policy of the system: input errors
//! surface immediately, not-found conditions become structured empty results,
//! transient failures are retryable, per-element analysis failures are logged
//! and skipped, and configuration errors are fatal at startup.

use thiserror::Error;

/// Result type alias for repolens operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for repolens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Vector store errors (index, metadata, persistence).
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Chunking errors (text partitioning).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Embedding generation errors.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Call-graph and bytecode analysis errors.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Tool registration and execution errors.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Query engine errors.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid caller input (empty query, bad parameter, invalid path).
    #[error("invalid input: {message}")]
    Input {
        /// Description of the invalid input.
        message: String,
    },

    /// Configuration errors. Fatal at startup.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Unrecoverable errors (storage corruption). Abort after best-effort flush.
    #[error("fatal: {message}")]
    Fatal {
        /// Description of the fatal condition.
        message: String,
    },
}

impl Error {
    /// Returns `true` when the failure is transient and worth retrying
    /// under the standard retry policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Embedding(e) => e.is_retryable(),
            Self::Tool(e) => e.is_retryable(),
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Convenience constructor for input errors.
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Convenience constructor for configuration errors.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Vector-store-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Vector dimensions do not match the store's configured dimensions.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Configured dimensions.
        expected: usize,
        /// Dimensions of the offending vector.
        got: usize,
    },

    /// Namespace not found.
    #[error("namespace not found: {namespace}")]
    NamespaceNotFound {
        /// Namespace that was not found.
        namespace: String,
    },

    /// Entry not found by chunk identifier.
    #[error("entry not found: {id}")]
    EntryNotFound {
        /// Chunk identifier that was not found.
        id: String,
    },

    /// Metadata is missing its namespace or disagrees with the index.
    #[error("metadata inconsistent for {id}: {reason}")]
    MetadataInconsistent {
        /// Chunk identifier.
        id: String,
        /// Why the metadata is inconsistent.
        reason: String,
    },

    /// Serialization or deserialization of persisted state failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Persisted index is corrupt beyond recovery.
    #[error("index corrupt: {path}: {reason}")]
    Corrupt {
        /// Path of the corrupt artifact.
        path: String,
        /// Why it could not be read.
        reason: String,
    },
}

/// Chunking-specific errors for text partitioning.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid chunking configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Embedding-generation errors with retry classification.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Transient provider failure (network, 5xx, 429). Retryable.
    #[error("transient provider failure: {reason}")]
    Transient {
        /// Reason for the failure.
        reason: String,
    },

    /// Permanent provider failure (4xx other than 429, empty or NaN result).
    #[error("permanent provider failure: {reason}")]
    Permanent {
        /// Reason for the failure.
        reason: String,
    },

    /// Provider returned a vector of unexpected dimensions.
    #[error("provider returned {got} dimensions, expected {expected}")]
    BadDimensions {
        /// Expected dimensions.
        expected: usize,
        /// Returned dimensions.
        got: usize,
    },

    /// Rate limiter rejected the request and retries exhausted.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Reason for the rejection.
        reason: String,
    },
}

impl EmbeddingError {
    /// Returns `true` for failures worth retrying with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }
}

/// Call-graph and class-file analysis errors.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Class file is malformed and cannot be parsed.
    #[error("malformed class file: {path}: {reason}")]
    MalformedClass {
        /// Path to the offending class file.
        path: String,
        /// Parse failure detail.
        reason: String,
    },

    /// Method not present in the call graph.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The method key that was looked up.
        method: String,
    },

    /// Class not present in the type cache.
    #[error("class not found: {class}")]
    ClassNotFound {
        /// The class name that was looked up.
        class: String,
    },

    /// Base-package scan root does not exist or is unreadable.
    #[error("scan root unavailable: {path}: {reason}")]
    ScanRoot {
        /// The scan root.
        path: String,
        /// Why it is unavailable.
        reason: String,
    },
}

/// Tool registration and execution errors.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A tool with the same name is already registered.
    #[error("duplicate tool: {name}")]
    Duplicate {
        /// The conflicting tool name.
        name: String,
    },

    /// No tool registered under the requested name.
    #[error("unknown tool: {name}")]
    Unknown {
        /// The requested tool name.
        name: String,
    },

    /// A required parameter is missing or malformed.
    #[error("invalid parameters for {name}: {reason}")]
    InvalidParams {
        /// Tool name.
        name: String,
        /// What was wrong with the parameters.
        reason: String,
    },

    /// The tool attempt exceeded its deadline.
    #[error("tool {name} timed out after {timeout_ms} ms")]
    Timeout {
        /// Tool name.
        name: String,
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// Transient execution failure. Retryable.
    #[error("tool {name} failed (transient): {reason}")]
    Transient {
        /// Tool name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// Permanent execution failure. Not retryable.
    #[error("tool {name} failed: {reason}")]
    Permanent {
        /// Tool name.
        name: String,
        /// Failure detail.
        reason: String,
    },

    /// Worker pool queue is full. Retryable by the caller.
    #[error("worker queue full (depth {depth})")]
    QueueFull {
        /// Observed queue depth at rejection.
        depth: usize,
    },
}

impl ToolError {
    /// Returns `true` for failures the retry policy should reattempt.
    ///
    /// Timeouts count as retryable per the attempt state machine.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::Timeout { .. } | Self::QueueFull { .. }
        )
    }
}

/// Query-engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The query was empty or unusable.
    #[error("empty query")]
    EmptyQuery,

    /// Total plan execution exceeded the configured wall-time cap.
    #[error("plan execution exceeded {limit_secs}s")]
    PlanTimeout {
        /// The wall-time cap that was exceeded.
        limit_secs: u64,
    },

    /// The LLM synthesis step failed.
    #[error("synthesis failed: {reason}")]
    Synthesis {
        /// Failure detail.
        reason: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read a file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write a file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

// Implement From traits for standard library and third-party errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}
