//! # Retrieval Backend Tests
//!
//! The generic HTTP backend is exercised against a wiremock server speaking
//! the `add_doc`/`query` protocol; the managed backend against an in-memory
//! object store plus a wiremock corpus query endpoint. Both must satisfy
//! the same contract: clamped scores, skipped malformed entries, idempotent
//! ingest by post id.

mod common;

use blogwatch::backend::{BackendError, HttpRagBackend, ManagedCorpusBackend, RetrievalBackend};
use blogwatch::types::{post_id_for_url, Summary};
use common::setup_tracing;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn sample_summary(url: &str, title: &str) -> Summary {
    Summary::new(
        post_id_for_url(url),
        title.to_string(),
        url.to_string(),
        "example".to_string(),
        None,
        "An executive summary of the post.".to_string(),
        "A technical summary long enough to satisfy the fifty character minimum imposed on it."
            .to_string(),
        vec!["first takeaway".to_string()],
        vec!["Rust".to_string(), "rust".to_string()],
    )
    .expect("summary fixture is valid")
}

// --- Generic HTTP backend ---

#[tokio::test]
async fn http_ingest_posts_the_documented_body_with_bearer_auth() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/add_doc"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let backend = HttpRagBackend::new(
        server.uri(),
        Some("secret-key".to_string()),
        "corpus-1".to_string(),
        TIMEOUT,
    )
    .expect("backend builds");

    let first = sample_summary("https://example.org/a", "Post A");
    let second = sample_summary("https://example.org/b", "Post B");
    backend.ingest(&first).await.expect("first ingest succeeds");
    backend.ingest(&second).await.expect("second ingest succeeds");

    let requests = server.received_requests().await.expect("requests recorded");
    assert_eq!(requests.len(), 2);

    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert_eq!(body["uuid"], json!("corpus-1"));
    assert_eq!(body["doc_index"], json!(0));
    assert!(body["document"].as_str().expect("document is text").contains("Post A"));
    assert_eq!(body["doc_metadata"]["post_id"], json!(first.post_id));
    assert_eq!(body["doc_metadata"]["source"], json!("example"));

    // The index counter advances per ingested document.
    let body: Value = serde_json::from_slice(&requests[1].body).expect("json body");
    assert_eq!(body["doc_index"], json!(1));
}

#[tokio::test]
async fn http_query_maps_results_and_clamps_scores() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({
            "question": "what changed?",
            "uuid": "corpus-1",
            "top_k": 8,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "page_content": "Snippet one.",
                    "score": 1.7,
                    "metadata": {"post_id": "p1", "title": "One", "url": "https://example.org/1"}
                },
                {
                    "page_content": "Snippet missing a url.",
                    "score": 0.9,
                    "metadata": {"post_id": "p2", "title": "Two"}
                },
                {
                    "page_content": "Snippet three.",
                    "score": -0.4,
                    "metadata": {"title": "Three", "url": "https://example.org/3"}
                }
            ]
        })))
        .mount(&server)
        .await;

    let backend =
        HttpRagBackend::new(server.uri(), None, "corpus-1".to_string(), TIMEOUT)
            .expect("backend builds");

    let docs = backend.retrieve("what changed?", 8).await.expect("query succeeds");

    // The malformed entry (no url) is skipped, not raised.
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].post_id, "p1");
    assert_eq!(docs[0].score, 1.0);
    assert_eq!(docs[1].score, 0.0);
    // A missing post id is recovered from the url hash.
    assert_eq!(docs[1].post_id, post_id_for_url("https://example.org/3"));
}

#[tokio::test]
async fn http_errors_carry_the_status_and_classify_transience() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let backend =
        HttpRagBackend::new(server.uri(), None, "corpus-1".to_string(), TIMEOUT)
            .expect("backend builds");

    let err = backend.retrieve("q", 8).await.expect_err("query fails");
    match &err {
        BackendError::Api { status, body } => {
            assert_eq!(*status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert!(err.is_transient());

    let permanent = BackendError::Api {
        status: 404,
        body: String::new(),
    };
    assert!(!permanent.is_transient());
}

// --- Managed corpus backend ---

fn managed_backend(store: Arc<InMemory>, query_url: String) -> ManagedCorpusBackend {
    ManagedCorpusBackend::new(
        store,
        "docs/".to_string(),
        "corpus-1".to_string(),
        query_url,
        TIMEOUT,
    )
    .expect("backend builds")
}

#[tokio::test]
async fn managed_ingest_writes_both_objects_under_the_prefix() {
    setup_tracing();
    let store = Arc::new(InMemory::new());
    let backend = managed_backend(store.clone(), "http://unused.invalid/query".to_string());

    let summary = sample_summary("https://example.org/a", "Post A");
    backend.ingest(&summary).await.expect("ingest succeeds");

    let doc_path = ObjectPath::from(format!("docs/{}.txt", summary.post_id));
    let document = store
        .get(&doc_path)
        .await
        .expect("document object exists")
        .bytes()
        .await
        .expect("document readable");
    assert_eq!(
        String::from_utf8_lossy(&document),
        summary.to_indexable_document()
    );

    let meta_path = ObjectPath::from(format!("docs/{}.metadata.json", summary.post_id));
    let metadata = store
        .get(&meta_path)
        .await
        .expect("metadata object exists")
        .bytes()
        .await
        .expect("metadata readable");
    let metadata: Value = serde_json::from_slice(&metadata).expect("metadata is json");
    assert_eq!(metadata["post_id"], json!(summary.post_id));
    assert_eq!(metadata["keywords"], json!(["rust"]));
}

#[tokio::test]
async fn managed_reingest_overwrites_instead_of_duplicating() {
    setup_tracing();
    let store = Arc::new(InMemory::new());
    let backend = managed_backend(store.clone(), "http://unused.invalid/query".to_string());

    let summary = sample_summary("https://example.org/a", "Post A");
    backend.ingest(&summary).await.expect("first ingest succeeds");

    let mut updated = summary.clone();
    updated.executive_summary = "A refreshed executive summary.".to_string();
    backend.ingest(&updated).await.expect("re-ingest succeeds");

    let objects: Vec<_> = store
        .list(Some(&ObjectPath::from("docs")))
        .try_collect()
        .await
        .expect("listing succeeds");
    assert_eq!(objects.len(), 2, "exactly one .txt and one .metadata.json");

    let document = store
        .get(&ObjectPath::from(format!("docs/{}.txt", summary.post_id)))
        .await
        .expect("document exists")
        .bytes()
        .await
        .expect("document readable");
    assert!(String::from_utf8_lossy(&document).contains("A refreshed executive summary."));
}

#[tokio::test]
async fn managed_query_maps_contexts_to_docs() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/corpus/query"))
        .and(body_partial_json(json!({
            "corpus_id": "corpus-1",
            "query": "gpu scheduling",
            "max_results": 4,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contexts": [
                {
                    "chunk_text": "Scheduling snippet.",
                    "relevance_score": 0.82,
                    "metadata": {"post_id": "p1", "title": "One", "url": "https://example.org/1"}
                },
                {
                    "chunk_text": "",
                    "relevance_score": 0.5,
                    "metadata": {"post_id": "p2", "title": "Two", "url": "https://example.org/2"}
                }
            ]
        })))
        .mount(&server)
        .await;

    let store = Arc::new(InMemory::new());
    let backend = managed_backend(store, format!("{}/corpus/query", server.uri()));

    let docs = backend.retrieve("gpu scheduling", 4).await.expect("query succeeds");

    // The empty-snippet entry is malformed and skipped.
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].post_id, "p1");
    assert_eq!(docs[0].snippet, "Scheduling snippet.");
    assert!((docs[0].score - 0.82).abs() < f64::EPSILON);
}
