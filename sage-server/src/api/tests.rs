//! Router-level tests exercising the API with mock providers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use sage_core::config::Config;
use sage_core::record::Record;

use super::*;
use crate::provider::{ProviderBuilder, ProviderInitError, Providers};
use crate::testutil::{MockEmbedder, MockLanguageModel, MockVectorStore, search_result};

fn test_config() -> Config {
    Config::parse(
        r#"
[vector_store]
type = "local"

[llm]
type = "ollama"
endpoint = "http://localhost:11434"
model = "llama3"
"#,
    )
    .unwrap()
}

fn sample_records() -> Vec<Record> {
    vec![
        Record {
            id: "1".into(),
            text: "A banana is a yellow fruit.".into(),
            region: Some("Tropical".into()),
            kind: Some("Fruit".into()),
        },
        Record {
            id: "2".into(),
            text: "Kale is a leafy green.".into(),
            region: None,
            kind: Some("Vegetable".into()),
        },
    ]
}

struct TestHarness {
    app: Router,
    store: MockVectorStore,
    llm: MockLanguageModel,
    embedder: MockEmbedder,
    builds: Arc<AtomicUsize>,
}

fn harness_with(store: MockVectorStore) -> TestHarness {
    let embedder = MockEmbedder::new(4);
    let llm = MockLanguageModel::new("Bananas are yellow.");
    let builds = Arc::new(AtomicUsize::new(0));

    let builder: ProviderBuilder<MockVectorStore, MockEmbedder, MockLanguageModel> = {
        let store = store.clone();
        let embedder = embedder.clone();
        let llm = llm.clone();
        let builds = Arc::clone(&builds);
        Box::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            let providers = Providers {
                store: store.clone(),
                embedder: embedder.clone(),
                llm: llm.clone(),
            };
            Box::pin(async move { Ok(providers) })
        })
    };

    let state = Arc::new(AppState::new(test_config(), sample_records(), builder));
    TestHarness {
        app: router(state),
        store,
        llm,
        embedder,
        builds,
    }
}

fn harness() -> TestHarness {
    harness_with(MockVectorStore::with_results(search_result(&[(
        "1",
        "A banana is a yellow fruit.",
        0.1,
    )])))
}

fn failing_harness() -> (Router, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let builder: ProviderBuilder<MockVectorStore, MockEmbedder, MockLanguageModel> = {
        let builds = Arc::clone(&builds);
        Box::new(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Err(ProviderInitError::InvalidConfig(
                    "endpoint is required when vector_store.type = \"hosted\"".into(),
                ))
            })
        })
    };
    let state = Arc::new(AppState::new(test_config(), sample_records(), builder));
    (router(state), builds)
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Search ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_returns_rag_details() {
    let h = harness();
    let (status, body) =
        post_json(h.app, "/api/search", r#"{"question": "What fruits are yellow?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["result_count"], 1);
    assert_eq!(body["details"]["documents"][0], "A banana is a yellow fruit.");
    assert!((body["details"]["similarities"][0].as_f64().unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn empty_question_rejected_before_provider_init() {
    let h = harness();
    let (status, body) = post_json(h.app, "/api/search", r#"{"question": "   "}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(
        body["error"].as_str().unwrap().contains("question"),
        "error should mention the question: {body}"
    );
    assert_eq!(
        h.builds.load(Ordering::SeqCst),
        0,
        "validation failures must not construct providers"
    );
}

#[tokio::test]
async fn empty_search_is_a_reported_failure() {
    let h = harness_with(MockVectorStore::empty());
    let (status, body) =
        post_json(h.app, "/api/search", r#"{"question": "unknown topic"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "no relevant information found");
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let h = harness();
    let (status, body) = post_json(h.app, "/api/search", "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));
}

// ── Generate ────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_answers_against_given_context() {
    let h = harness();
    let (status, body) = post_json(
        h.app,
        "/api/generate",
        r#"{"question": "What fruits are yellow?", "documents": ["A banana is a yellow fruit."]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["answer"], "Bananas are yellow.");
    assert!(body["latency_ms"].is_u64());

    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains(
        "Context:\nA banana is a yellow fruit.\n\nQuestion: What fruits are yellow?\nAnswer:"
    ));
}

// ── Ask (combined) ──────────────────────────────────────────────────────

#[tokio::test]
async fn ask_combines_search_and_generation() {
    let h = harness();
    let (status, body) =
        post_json(h.app, "/api/ask", r#"{"question": "What fruits are yellow?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["result_count"], 1);
    assert_eq!(body["answer"], "Bananas are yellow.");
}

#[tokio::test]
async fn ask_with_empty_store_never_calls_the_model() {
    let h = harness_with(MockVectorStore::empty());
    let (_, body) = post_json(h.app, "/api/ask", r#"{"question": "anything"}"#).await;

    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "no relevant information found");
    assert!(h.llm.last_prompt().is_none());
}

// ── Ingestion ───────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_reports_processed_count() {
    let h = harness_with(MockVectorStore::empty());
    let (status, body) = post_json(h.app, "/api/ingest", r#"{"force": true}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["processed"], 2);
    assert_eq!(h.store.batches().len(), 1);
}

#[tokio::test]
async fn ingest_accepts_an_empty_body() {
    let h = harness_with(MockVectorStore::empty());
    let (status, body) = post_json(h.app, "/api/ingest", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn status_reports_embedding_progress() {
    let h = harness_with(MockVectorStore::with_existing_ids(&["1"]));
    let (status, body) = get_json(h.app, "/api/ingest/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"]["total_records"], 2);
    assert_eq!(body["status"]["embedded_count"], 1);
    assert_eq!(body["status"]["remaining_count"], 1);
    assert!((body["status"]["percentage"].as_f64().unwrap() - 50.0).abs() < 1e-6);
}

// ── Provider lifecycle ──────────────────────────────────────────────────

#[tokio::test]
async fn providers_built_once_and_reused() {
    let h = harness();
    for _ in 0..3 {
        let (_, body) =
            post_json(h.app.clone(), "/api/search", r#"{"question": "bananas?"}"#).await;
        assert_eq!(body["success"], true);
    }

    assert_eq!(h.builds.load(Ordering::SeqCst), 1, "singletons must be reused");
    assert_eq!(h.embedder.call_count(), 3, "each search embeds once");
}

#[tokio::test]
async fn failed_init_is_reported_and_retried_cleanly() {
    let (app, builds) = failing_harness();

    let (status, body) =
        post_json(app.clone(), "/api/search", r#"{"question": "bananas?"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("provider initialization failed"),
        "got: {body}"
    );

    // The failed attempt left nothing behind, so the next request rebuilds.
    let (_, body) = post_json(app, "/api/search", r#"{"question": "bananas?"}"#).await;
    assert_eq!(body["success"], false);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}
