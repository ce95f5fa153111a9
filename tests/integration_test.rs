//! Integration tests for repolens.

#![allow(clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;

use repolens::config::Config;
use repolens::embedding::{EmbeddingClient, create_embedder};
use repolens::engine::{
    ChatOptions, ConfidenceCalculator, HybridQueryEngine, OfflineSynthesizer,
};
use repolens::errorchain::ErrorChainAnalyzer;
use repolens::graph::GraphAnalyzer;
use repolens::ingest::IngestPipeline;
use repolens::mcp::tools::{CallPathTool, ConfigImpactTool, CrossRepoTool, ErrorChainTool};
use repolens::mcp::{McpHandler, McpRequest, PlannedTool, ToolRegistry};
use repolens::store::VectorStore;
use tempfile::TempDir;

struct Harness {
    config: Config,
    store: Arc<VectorStore>,
    embeddings: Arc<EmbeddingClient>,
    engine: HybridQueryEngine,
    _data: TempDir,
}

/// Builds the full component graph over a fresh data root, optionally with
/// error-chain scanning pointed at a source directory.
fn harness(scan_root: Option<&Path>) -> Harness {
    let data = TempDir::new().expect("tempdir");
    let mut builder = Config::builder()
        .data_root(data.path())
        .dimensions(128)
        .max_chunk_size(400)
        .overlap_size(40)
        .min_chunk_size(20);
    if let Some(root) = scan_root {
        builder = builder.scan_paths(vec![root.to_path_buf()]);
    }
    let config = builder.build().expect("config");

    let store = Arc::new(
        VectorStore::open(config.store.clone(), data.path()).expect("store open"),
    );
    let embeddings = Arc::new(EmbeddingClient::new(
        create_embedder(config.store.dimensions).expect("embedder"),
        config.retry,
        config.rate_limit,
        store.failures(),
    ));
    let graph = Arc::new(GraphAnalyzer::new(config.callpath.clone()));
    let errorchain = Arc::new(ErrorChainAnalyzer::new(config.errorchain.clone()));

    let registry = Arc::new(ToolRegistry::new());
    registry
        .register(Arc::new(CallPathTool::new(
            Arc::clone(&graph),
            config.callpath.max_depth,
        )))
        .expect("register call-path");
    registry
        .register(Arc::new(ErrorChainTool::new(
            errorchain,
            Arc::clone(&graph),
        )))
        .expect("register error-chain");
    registry
        .register(Arc::new(ConfigImpactTool::new(config.errorchain.clone())))
        .expect("register config-impact");
    registry
        .register(Arc::new(CrossRepoTool::new(
            Arc::clone(&store),
            Arc::clone(&embeddings),
        )))
        .expect("register cross-repo");

    let handler = Arc::new(McpHandler::new(registry, config.retry, config.hybrid));
    let engine = HybridQueryEngine::new(
        Arc::clone(&store),
        Arc::clone(&embeddings),
        handler,
        graph,
        Arc::new(OfflineSynthesizer::new()),
        ConfidenceCalculator::new(config.confidence),
        config.hybrid,
    );

    Harness {
        config,
        store,
        embeddings,
        engine,
        _data: data,
    }
}

fn write_customer_repo(dir: &TempDir) -> std::path::PathBuf {
    let repo = dir.path().join("customer-service");
    std::fs::create_dir_all(repo.join("svc")).expect("mkdir");
    std::fs::write(
        repo.join("svc/CustomerService.java"),
        "class CustomerService {\n  Customer findById(long id) {\n    log.info(\"loading customer {}\", id);\n    log.info(\"loaded customer {}\", id);\n    return repository.load(id);\n  }\n}\n",
    )
    .expect("write");
    std::fs::write(
        repo.join("svc/OrderService.java"),
        "class OrderService {\n  Order place(long id) {\n    try {\n      return gateway.submit(id);\n    } catch (GatewayException e) {\n      throw new OrderException(\"submit failed\", new GatewayException(cause));\n    }\n  }\n}\n",
    )
    .expect("write");
    repo
}

#[tokio::test]
async fn test_ingest_then_answer_end_to_end() {
    let source = TempDir::new().expect("tempdir");
    let repo = write_customer_repo(&source);
    let h = harness(Some(&repo));

    let pipeline = IngestPipeline::new(
        &h.config,
        Arc::clone(&h.embeddings),
        Arc::clone(&h.store),
    )
    .expect("pipeline");
    let report = pipeline
        .generate_embeddings(&repo, true, None)
        .expect("ingest");
    assert_eq!(report.namespace, "customer-service");
    assert!(report.chunks_stored >= 2);
    assert_eq!(report.chunks_failed, 0);

    let answer = h
        .engine
        .answer(
            "How does the CustomerService retrieve customer information?",
            ChatOptions::default(),
        )
        .await
        .expect("answer");

    assert!(answer.sources.code_snippets >= 1);
    assert!(answer.answer.contains("CustomerService.java"));
    // Two log statements in the service yield a workflow edge.
    assert!(answer.sources.workflow_steps >= 1);
    assert!((0.0..=1.0).contains(&answer.confidence));
    assert!(!answer.confidence_rating.is_empty());
    assert_eq!(answer.confidence_explanation.components.len(), 4);
}

#[tokio::test]
async fn test_empty_index_low_confidence() {
    let h = harness(None);
    let answer = h
        .engine
        .answer("hello", ChatOptions::default())
        .await
        .expect("answer");

    assert_eq!(answer.sources.code_snippets, 0);
    assert!(answer.confidence <= 0.5);
    assert!(answer.confidence_rating == "Low" || answer.confidence_rating == "Very Low");
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let h = harness(None);
    assert!(h.engine.answer("   ", ChatOptions::default()).await.is_err());
    assert!(h.engine.hybrid_query("").await.is_err());
}

#[tokio::test]
async fn test_namespace_isolation_through_retrieval() {
    let source_a = TempDir::new().expect("tempdir");
    let source_b = TempDir::new().expect("tempdir");
    let repo_a = source_a.path().join("repo-a");
    let repo_b = source_b.path().join("repo-b");
    std::fs::create_dir_all(&repo_a).expect("mkdir");
    std::fs::create_dir_all(&repo_b).expect("mkdir");
    std::fs::write(
        repo_a.join("Billing.java"),
        "class Billing { int computeInvoiceTotal() { return 1; } }\n",
    )
    .expect("write");
    std::fs::write(
        repo_b.join("Shipping.java"),
        "class Shipping { int estimateDeliveryDays() { return 2; } }\n",
    )
    .expect("write");

    let h = harness(None);
    let pipeline = IngestPipeline::new(
        &h.config,
        Arc::clone(&h.embeddings),
        Arc::clone(&h.store),
    )
    .expect("pipeline");
    pipeline.generate_embeddings(&repo_a, true, None).expect("ingest a");
    pipeline.generate_embeddings(&repo_b, true, None).expect("ingest b");

    // Scoped retrieval never crosses namespaces.
    let scoped = h
        .engine
        .retrieve("computeInvoiceTotal billing", &["repo-a".to_string()])
        .expect("retrieve");
    assert!(!scoped.is_empty());
    assert!(
        scoped
            .iter()
            .all(|s| s.metadata.repository_namespace == "repo-a")
    );

    let other = h
        .engine
        .retrieve("computeInvoiceTotal billing", &["repo-b".to_string()])
        .expect("retrieve");
    assert!(other.iter().all(|s| s.metadata.repository_namespace == "repo-b"));
}

#[tokio::test]
async fn test_store_read_delete_roundtrip() {
    let source = TempDir::new().expect("tempdir");
    let repo = write_customer_repo(&source);
    let h = harness(None);

    let pipeline = IngestPipeline::new(
        &h.config,
        Arc::clone(&h.embeddings),
        Arc::clone(&h.store),
    )
    .expect("pipeline");
    pipeline.generate_embeddings(&repo, true, None).expect("ingest");

    let found = h
        .store
        .find_by_file_path("svc/CustomerService.java", Some("customer-service"));
    assert!(!found.is_empty());
    let id = found[0].0.clone();

    assert!(h.store.delete(&id, "customer-service").expect("delete"));
    let after = h
        .store
        .find_by_file_path("svc/CustomerService.java", Some("customer-service"));
    assert!(after.iter().all(|(other, _)| *other != id));
}

#[tokio::test]
async fn test_reingestion_is_noop() {
    let source = TempDir::new().expect("tempdir");
    let repo = write_customer_repo(&source);
    let h = harness(None);

    let pipeline = IngestPipeline::new(
        &h.config,
        Arc::clone(&h.embeddings),
        Arc::clone(&h.store),
    )
    .expect("pipeline");
    let first = pipeline.generate_embeddings(&repo, true, None).expect("ingest");
    let second = pipeline.generate_embeddings(&repo, true, None).expect("ingest");

    assert!(first.chunks_changed > 0);
    assert_eq!(second.chunks_changed, 0);
    assert!(h.store.failures().is_empty());
    assert_eq!(
        h.store.size(Some("customer-service")),
        first.chunks_stored
    );
}

#[tokio::test]
async fn test_error_diagnosis_plans_error_chain() {
    let source = TempDir::new().expect("tempdir");
    let repo = write_customer_repo(&source);
    let h = harness(Some(&repo));

    let result = h
        .engine
        .hybrid_query("why does OrderException fail during checkout")
        .await
        .expect("hybrid query");

    // The error-chain tool ran against the scanned sources.
    assert!(result.tool_responses.contains_key("error-chain"));
    assert!(result.tool_errors.is_empty());
    assert!(result.success);
    let data = &result.tool_responses["error-chain"]["data"];
    assert!(
        data["throw_locations"]
            .as_array()
            .is_some_and(|a| !a.is_empty())
    );
}

#[tokio::test]
async fn test_required_tool_failure_flags_partial() {
    let h = harness(None);
    let request = McpRequest {
        query: "plan with a missing required tool".to_string(),
        execution_plan: vec![
            PlannedTool {
                tool_name: "no-such-tool".to_string(),
                params: serde_json::json!({}),
                priority: 1,
                required: true,
            },
            PlannedTool {
                tool_name: "cross-repo".to_string(),
                params: serde_json::json!({ "query": "anything" }),
                priority: 2,
                required: false,
            },
        ],
        context_data: serde_json::Value::Null,
    };
    let response = h.engine.handler().process(&request).await;

    assert_eq!(response.metadata["status"], "partial_success");
    assert_eq!(response.tool_results.len(), 1);
    let errors = response.metadata["tool_errors"].as_array().expect("errors");
    assert_eq!(errors[0]["tool"], "no-such-tool");
}

mod cli {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_embeddings_exit_zero() {
        let data = TempDir::new().expect("tempdir");
        let source = TempDir::new().expect("tempdir");
        std::fs::write(
            source.path().join("A.java"),
            "class A { void f() { int x = 1; } }",
        )
        .expect("write");

        Command::cargo_bin("repolens")
            .expect("binary")
            .args([
                "--data-root",
                data.path().to_str().expect("utf8"),
                "generate-embeddings",
                "--path",
                source.path().to_str().expect("utf8"),
                "--recursive",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Files processed"));
    }

    #[test]
    fn test_missing_path_exit_one() {
        let data = TempDir::new().expect("tempdir");
        Command::cargo_bin("repolens")
            .expect("binary")
            .args([
                "--data-root",
                data.path().to_str().expect("utf8"),
                "generate-embeddings",
                "--path",
                "/definitely/not/here",
            ])
            .assert()
            .failure();
    }

    #[test]
    fn test_inspect_json_format() {
        let data = TempDir::new().expect("tempdir");
        Command::cargo_bin("repolens")
            .expect("binary")
            .args([
                "--data-root",
                data.path().to_str().expect("utf8"),
                "--format",
                "json",
                "inspect",
                "Nothing.java",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"chunks\":[]"));
    }
}
