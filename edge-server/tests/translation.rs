//! End-to-end translation tests: HTTP request, worker, mocked backend, cache.

use reqwest::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xmcl_edge_server::config::{Config, TranslationConfig};
use xmcl_edge_server::http::build_router;
use xmcl_edge_server::server::{EdgeMetrics, EdgeServer};
use xmcl_edge_server::storage::{SqliteStore, TranslationStore};
use xmcl_edge_server::translation::{spawn_translation_worker, ChatBackend, TranslationPipeline};

fn reply(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

async fn start_server(backend: &MockServer) -> SocketAddr {
    let config = Config {
        translation: TranslationConfig {
            backend_url: format!("{}/v1/chat/completions", backend.uri()),
            ..TranslationConfig::default()
        },
        ..Config::default()
    };

    let store: Arc<dyn TranslationStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
    let metrics = Arc::new(EdgeMetrics::default());
    let (pipeline, jobs) = TranslationPipeline::new(store.clone(), metrics.clone(), 8);
    let chat = ChatBackend::new(&config.translation, Some("sk-test".into())).unwrap();
    spawn_translation_worker(
        jobs,
        store.clone(),
        Arc::new(chat),
        config.translation.clone(),
        metrics.clone(),
    );
    let server = Arc::new(EdgeServer::new(config, store, pipeline, metrics));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(server);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// POST until the status stops being 202.
async fn poll_until_ready(
    client: &reqwest::Client,
    addr: SocketAddr,
    body: serde_json::Value,
) -> reqwest::Response {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = client
                .post(format!("http://{}/translation", addr))
                .json(&body)
                .send()
                .await
                .unwrap();
            if response.status() != StatusCode::ACCEPTED {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("translation never became ready")
}

#[tokio::test]
async fn miss_is_translated_once_then_served_from_cache() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("こんにちは")))
        .expect(1)
        .mount(&backend)
        .await;
    let addr = start_server(&backend).await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({ "text": "Hello", "locale": "ja" });

    let first = client
        .post(format!("http://{}/translation", addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let ready = poll_until_ready(&client, addr, body.clone()).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.headers()["content-language"], "ja");
    assert_eq!(ready.text().await.unwrap(), "こんにちは");

    let again = poll_until_ready(&client, addr, body).await;
    assert_eq!(again.status(), StatusCode::OK);
    // MockServer verifies `expect(1)` on drop.
}

#[tokio::test]
async fn markdown_sections_are_translated_and_links_restored() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("First"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("## 第一\n见 [文档](0)\n")))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("Second"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("## 第二\n")))
        .mount(&backend)
        .await;

    let addr = start_server(&backend).await;
    let client = reqwest::Client::new();
    let text = format!(
        "## First\nSee [docs](https://example.com/docs)\n{}\n## Second\n",
        "x".repeat(20_000)
    );
    let body = serde_json::json!({ "text": text, "locale": "zh-CN" });

    let ready = poll_until_ready(&client, addr, body).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let content = ready.text().await.unwrap();
    assert!(content.contains("[文档](https://example.com/docs)"), "{}", content);
    assert!(content.find("第一").unwrap() < content.find("第二").unwrap());
}

#[tokio::test]
async fn backend_failure_leaves_request_pending_and_retryable() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hallo")))
        .mount(&backend)
        .await;

    let addr = start_server(&backend).await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({ "text": "Hello", "locale": "de" });

    // The first job fails and releases its lock; a later request starts over.
    let ready = poll_until_ready(&client, addr, body).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.text().await.unwrap(), "Hallo");
}
