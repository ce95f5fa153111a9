//! Command execution.
//!
//! Builds the component graph from configuration and dispatches each CLI
//! command. Sync commands run inline; `serve` builds a tokio runtime and
//! hosts the HTTP API with the call-graph initialization running in the
//! background.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::chunking::extract_log_statements;
use crate::cli::output::{
    OutputFormat, format_graph_stats, format_ingest_report, format_inspect, format_workflow,
};
use crate::cli::parser::{Cli, Commands};
use crate::config::Config;
use crate::embedding::{EmbeddingClient, create_embedder};
use crate::engine::{
    ConfidenceCalculator, HybridQueryEngine, OfflineSynthesizer, WorkflowStep,
};
use crate::error::{Error, Result};
use crate::errorchain::ErrorChainAnalyzer;
use crate::graph::GraphAnalyzer;
use crate::ingest::IngestPipeline;
use crate::mcp::tools::{CallPathTool, ConfigImpactTool, CrossRepoTool, ErrorChainTool};
use crate::mcp::{McpHandler, ToolRegistry};
use crate::server::AppState;
use crate::store::{VectorStore, persist};

/// Core components shared by every command.
struct Components {
    config: Config,
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingClient>,
}

impl Components {
    fn build(cli: &Cli) -> Result<Self> {
        let mut builder = Config::builder().from_env();
        if let Some(data_root) = &cli.data_root {
            builder = builder.data_root(data_root.clone());
        }
        let config = builder.build()?;

        let store = Arc::new(VectorStore::open(config.store.clone(), &config.data_root)?);
        let embedder = create_embedder(config.store.dimensions)?;
        let embeddings = Arc::new(EmbeddingClient::new(
            embedder,
            config.retry,
            config.rate_limit,
            store.failures(),
        ));

        Ok(Self {
            config,
            store,
            embeddings,
        })
    }

    fn ingest(&self) -> Result<IngestPipeline> {
        IngestPipeline::new(
            &self.config,
            Arc::clone(&self.embeddings),
            Arc::clone(&self.store),
        )
    }
}

/// Executes the parsed CLI, returning the output to print.
///
/// # Errors
///
/// Returns an error for invalid configuration, missing paths, or failed
/// subsystem operations; the binary maps it to exit code 1.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let components = Components::build(cli)?;

    match &cli.command {
        Commands::GenerateEmbeddings {
            path,
            recursive,
            namespace,
            exit: _,
        } => {
            let report = components.ingest()?.generate_embeddings(
                path,
                *recursive,
                namespace.as_deref(),
            )?;
            Ok(format_ingest_report(&report, format))
        }

        Commands::BuildKnowledgeGraph { output } => {
            let (stats, cache_path) = build_knowledge_graph(&components.config, output.as_ref())?;
            Ok(format_graph_stats(&stats, &cache_path, format))
        }

        Commands::AnalyzeWorkflow { path } => {
            let steps = analyze_workflow(&components.config, path.as_ref());
            Ok(format_workflow(&steps, format))
        }

        Commands::GenerateAll { path, recursive } => {
            let report = components
                .ingest()?
                .generate_embeddings(path, *recursive, None)?;
            let (stats, cache_path) = build_knowledge_graph(&components.config, None)?;

            let mut out = format_ingest_report(&report, format);
            out.push('\n');
            out.push_str(&format_graph_stats(&stats, &cache_path, format));
            Ok(out)
        }

        Commands::Inspect { filepath } => {
            let entries = components.store.find_by_file_path(filepath, None);
            Ok(format_inspect(filepath, &entries, format))
        }

        Commands::Serve { host, port } => {
            let state = build_app_state(&components)?;
            let host = host.clone();
            let port = *port;
            tokio::runtime::Runtime::new()
                .map_err(|e| Error::Fatal {
                    message: format!("failed to start runtime: {e}"),
                })?
                .block_on(crate::server::serve(state, &host, port))
                .map_err(|e| Error::Fatal {
                    message: e.to_string(),
                })?;
            Ok(String::new())
        }
    }
}

/// Builds and caches the call graph in the foreground.
fn build_knowledge_graph(
    config: &Config,
    output: Option<&PathBuf>,
) -> Result<(crate::graph::GraphStats, String)> {
    let analyzer = GraphAnalyzer::new(config.callpath.clone());
    analyzer.initialize();

    let cache_path = output.cloned().unwrap_or_else(|| {
        persist::call_graph_path(&config.data_root)
    });
    analyzer.save_cache(&cache_path)?;
    Ok((analyzer.stats(), cache_path.display().to_string()))
}

/// Extracts workflow edges from the log statements of scanned sources.
fn analyze_workflow(config: &Config, path: Option<&PathBuf>) -> Vec<WorkflowStep> {
    let roots: Vec<PathBuf> = path.map_or_else(
        || config.errorchain.scan_paths.clone(),
        |p| vec![p.clone()],
    );

    let mut steps = Vec::new();
    for root in roots {
        if !root.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "java"))
        {
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let logs = extract_log_statements(&content);
            for pair in logs.windows(2) {
                steps.push(WorkflowStep {
                    source_file: entry.path().display().to_string(),
                    from: pair[0].message.clone(),
                    to: pair[1].message.clone(),
                    confidence: if pair[0].level == pair[1].level { 0.9 } else { 0.6 },
                    pattern: Some(format!("{}->{}", pair[0].level, pair[1].level)),
                });
            }
        }
    }
    steps
}

/// Assembles the full server state: store, tools, handler, engine, ingest.
fn build_app_state(components: &Components) -> Result<AppState> {
    let config = &components.config;
    let graph = Arc::new(GraphAnalyzer::new(config.callpath.clone()));

    // Prefer the cached graph; fall back to a background scan.
    let cache_path = persist::call_graph_path(&config.data_root);
    if cache_path.exists() && graph.load_cache(&cache_path).is_ok() {
        info!(cache = %cache_path.display(), "call graph restored from cache");
    } else {
        graph.spawn_initialize();
    }

    let errorchain = Arc::new(ErrorChainAnalyzer::new(config.errorchain.clone()));

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(Arc::new(CallPathTool::new(
            Arc::clone(&graph),
            config.callpath.max_depth,
        )))
        .map_err(Error::from)?;
    registry
        .register(Arc::new(ErrorChainTool::new(
            errorchain,
            Arc::clone(&graph),
        )))
        .map_err(Error::from)?;
    registry
        .register(Arc::new(ConfigImpactTool::new(config.errorchain.clone())))
        .map_err(Error::from)?;
    registry
        .register(Arc::new(CrossRepoTool::new(
            Arc::clone(&components.store),
            Arc::clone(&components.embeddings),
        )))
        .map_err(Error::from)?;

    let handler = Arc::new(McpHandler::new(registry, config.retry, config.hybrid));
    let engine = Arc::new(HybridQueryEngine::new(
        Arc::clone(&components.store),
        Arc::clone(&components.embeddings),
        handler,
        Arc::clone(&graph),
        Arc::new(OfflineSynthesizer::new()),
        ConfidenceCalculator::new(config.confidence),
        config.hybrid,
    ));

    Ok(AppState {
        engine,
        store: Arc::clone(&components.store),
        ingest: Arc::new(components.ingest()?),
        graph,
        flush_interval: config.store.flush_interval,
    })
}
