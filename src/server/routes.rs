//! Route handlers for the JSON API.
//!
//! - `POST /chat` — answer a question with confidence enrichment.
//! - `POST /mcp/query` — classify, plan, and execute tools for a query.
//! - `POST /mcp/request` — execute an explicit `McpRequest` plan.
//! - `POST /hybrid/query` — retrieval plus tools, no synthesis.
//! - `POST /hybrid/tools` — list registered tools.
//! - `GET /metrics` — store sizes, failure counts, availability.
//! - `POST /generate-embeddings` — trigger the ingestion pipeline.
//!
//! Missing or empty queries are 400s; internal failures are 500s with a
//! structured error body.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::engine::{ChatOptions, HybridQueryEngine};
use crate::error::{EngineError, Error};
use crate::graph::GraphAnalyzer;
use crate::ingest::IngestPipeline;
use crate::mcp::McpRequest;
use crate::store::VectorStore;

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The query engine.
    pub engine: Arc<HybridQueryEngine>,
    /// The vector store (for metrics and flushing).
    pub store: Arc<VectorStore>,
    /// The ingestion pipeline.
    pub ingest: Arc<IngestPipeline>,
    /// The call-graph analyzer (readiness in metrics).
    pub graph: Arc<GraphAnalyzer>,
    /// Persistence flush cadence.
    pub flush_interval: Duration,
}

/// Builds the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/mcp/query", post(mcp_query))
        .route("/mcp/request", post(mcp_request))
        .route("/hybrid/query", post(hybrid_query))
        .route("/hybrid/tools", post(hybrid_tools))
        .route("/metrics", get(metrics))
        .route("/generate-embeddings", post(generate_embeddings))
        .with_state(state)
}

/// Maps engine errors onto HTTP responses.
fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Input { .. } | Error::Engine(EngineError::EmptyQuery) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "request failed");
    }
    (status, axum::Json(json!({ "error": err.to_string() }))).into_response()
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    query: Option<String>,
    #[serde(default)]
    context_type: Option<String>,
    #[serde(default)]
    context_id: Option<String>,
    #[serde(default)]
    include_full_files: bool,
}

async fn chat(State(state): State<AppState>, axum::Json(body): axum::Json<ChatBody>) -> Response {
    let Some(query) = body.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "query is required" })),
        )
            .into_response();
    };

    let options = ChatOptions {
        context_type: body.context_type,
        context_id: body.context_id,
        include_full_files: body.include_full_files,
        namespaces: Vec::new(),
        articles: Vec::new(),
    };

    match state.engine.answer(query, options).await {
        Ok(answer) => axum::Json(answer).into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
struct McpQueryParams {
    #[serde(default)]
    query: String,
}

async fn mcp_query(
    State(state): State<AppState>,
    Query(params): Query<McpQueryParams>,
) -> Response {
    match state.engine.mcp_query(&params.query).await {
        Ok(response) => axum::Json(response).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn mcp_request(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<McpRequest>,
) -> Response {
    if request.query.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "query is required" })),
        )
            .into_response();
    }
    let response = state.engine.handler().process(&request).await;
    axum::Json(response).into_response()
}

#[derive(Debug, Deserialize)]
struct HybridBody {
    query: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    context: Option<serde_json::Value>,
}

async fn hybrid_query(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<HybridBody>,
) -> Response {
    let query = body.query.unwrap_or_default();
    match state.engine.hybrid_query(&query).await {
        Ok(result) => axum::Json(result).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn hybrid_tools(State(state): State<AppState>) -> Response {
    axum::Json(json!({ "tools": state.engine.handler().registry().list() })).into_response()
}

async fn metrics(State(state): State<AppState>) -> Response {
    let store_metrics = state.store.metrics();
    axum::Json(json!({
        "store": store_metrics,
        "llm_available": state.engine.llm_available(),
        "call_graph": {
            "ready": state.graph.is_ready(),
            "stats": state.graph.stats(),
        },
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct IngestParams {
    path: Option<String>,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    namespace: Option<String>,
}

async fn generate_embeddings(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
) -> Response {
    let Some(path) = params.path.filter(|p| !p.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({ "error": "path is required" })),
        )
            .into_response();
    };

    let ingest = Arc::clone(&state.ingest);
    let recursive = params.recursive;
    let namespace = params.namespace;
    let result = tokio::task::spawn_blocking(move || {
        ingest.generate_embeddings(&PathBuf::from(path), recursive, namespace.as_deref())
    })
    .await;

    match result {
        Ok(Ok(report)) => axum::Json(report).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => {
            error!(error = %join_err, "ingestion task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(json!({ "error": "ingestion task failed" })),
            )
                .into_response()
        }
    }
}
