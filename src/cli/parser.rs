//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// repolens: codebase question answering over embeddings and static analysis.
///
/// Ingests repositories into a namespaced vector store, builds a call graph
/// from compiled classes, and serves hybrid retrieval plus analysis tools
/// over an HTTP API.
#[derive(Parser, Debug)]
#[command(name = "repolens")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory for persisted state.
    ///
    /// Defaults to `.repolens` in the current directory.
    #[arg(short, long, env = "REPOLENS_DATA_ROOT")]
    pub data_root: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed, and store a file or repository.
    #[command(name = "generate-embeddings")]
    GenerateEmbeddings {
        /// File or directory to ingest.
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,

        /// Namespace override; defaults to the root directory name.
        #[arg(long)]
        namespace: Option<String>,

        /// Exit when generation completes (the default; accepted for
        /// script compatibility).
        #[arg(long)]
        exit: bool,
    },

    /// Build the call graph from compiled classes and cache it.
    #[command(name = "build-knowledge-graph")]
    BuildKnowledgeGraph {
        /// Cache artifact path; defaults to `graph/call-graph.bin` under
        /// the data root.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Extract workflow edges from log statements in sources.
    #[command(name = "analyze-workflow")]
    AnalyzeWorkflow {
        /// Source root; defaults to the configured scan paths.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Generate embeddings and the knowledge graph in one pass.
    #[command(name = "generate-all")]
    GenerateAll {
        /// File or directory to ingest.
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,
    },

    /// Show the stored chunks for a file path.
    Inspect {
        /// File path (exact or suffix match).
        filepath: String,
    },

    /// Serve the HTTP API.
    Serve {
        /// Bind address.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port.
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}
