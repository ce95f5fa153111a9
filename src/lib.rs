//! # repolens
//!
//! Codebase question answering over a large, multi-repository system.
//!
//! repolens combines two complementary retrieval modes: a semantic/keyword
//! hybrid search over pre-computed code embeddings, and a control plane of
//! static-analysis tools (call-path, error-chain, configuration-impact,
//! cross-repository tracing) executed under a shared retry and timeout
//! discipline. Answers are synthesized through a pluggable LLM seam and
//! carry a calibrated confidence rating.
//!
//! ## Subsystems
//!
//! - **Chunking & embedding**: deterministic, line-addressable chunks with
//!   batched embedding generation, failure tracking, and retry
//! - **Vector store**: per-repository namespaces over an HNSW index with a
//!   metadata side-store and eventual persistence
//! - **Hybrid retrieval**: semantic, keyword, and fused strategies with
//!   query-type-aware weighting
//! - **Call graph**: forward/reverse method graphs and exception
//!   hierarchies parsed from compiled classes
//! - **Query engine**: classify → retrieve → plan tools → execute →
//!   synthesize → confidence

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped class-file reading (memmap2)
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod config;
pub mod core;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod errorchain;
pub mod graph;
pub mod ingest;
pub mod mcp;
pub mod retrieval;
pub mod server;
pub mod store;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use config::Config;
pub use core::{Chunk, ChunkKind, EmbeddingFailure, EmbeddingMetadata, LogStatement};

// Re-export chunking types
pub use chunking::{BoilerplateFilter, Chunker, detect_language};

// Re-export embedding types
pub use embedding::{
    DEFAULT_DIMENSIONS, Embedder, EmbeddingClient, FailureLog, HashEmbedder, cosine_similarity,
    create_embedder,
};

// Re-export store types
pub use store::{SimilarityHit, StoredEntry, VectorStore};

// Re-export retrieval types
pub use retrieval::{
    HybridStrategy, KeywordStrategy, QueryType, RetrievalQuery, RetrievalStrategy,
    SemanticStrategy, StrategyRegistry, classify_query,
};

// Re-export graph types
pub use graph::{
    CallGraph, ExceptionNode, GraphAnalyzer, MethodNode, PropagationAction, PropagationChain,
    analyze_exception_propagation,
};

// Re-export error-chain types
pub use errorchain::{ErrorChainAnalyzer, ErrorChainResult};

// Re-export MCP types
pub use mcp::{
    AnalysisTool, McpHandler, McpRequest, McpResponse, PlannedTool, ToolRegistry, ToolResponse,
};

// Re-export engine types
pub use engine::{
    ChatAnswer, ChatOptions, ConfidenceCalculator, ConfidenceMetrics, HybridQueryEngine,
    LlmService, OfflineSynthesizer, QueryCategory,
};

// Re-export ingestion types
pub use ingest::{IngestPipeline, IngestReport};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat, execute};
