//! HTTP Collaborator Tests
//!
//! Exercises the feed source, Misskey client, Gemini summarizer and content
//! fetcher against a local axum server.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use common::{rss_document, spawn_server, Item};
use feedrelay::config::SummarizerConfig;
use feedrelay::{
    ContentFetcher, DeliveryPort, FeedSource, GeminiSummarizer, HtmlContentFetcher,
    HttpFeedSource, MisskeyClient, Note, RelayError, Summarizer, Visibility,
};

type Captured = Arc<Mutex<Vec<Value>>>;

#[tokio::test]
async fn test_http_feed_source_fetches_and_parses() {
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let body = rss_document(&[
        Item::new("guid-1", "First post", t).with_description("Hello"),
        Item::new("guid-2", "Second post", t + chrono::Duration::hours(1)),
    ]);

    let router = Router::new().route(
        "/feed.xml",
        get(move || {
            let body = body.clone();
            async move { ([(header::CONTENT_TYPE, "application/rss+xml")], body) }
        }),
    );
    let base = spawn_server(router).await;

    let source = HttpFeedSource::new().unwrap();
    let entries = source.fetch(&format!("{base}/feed.xml")).await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, "guid-1");
    assert_eq!(entries[0].title, "First post");
    assert_eq!(entries[0].link, "https://example.tld/guid-1");
    assert_eq!(entries[0].description, "Hello");
    assert_eq!(entries[0].published, t);
    assert_eq!(entries[1].published, t + chrono::Duration::hours(1));
}

#[tokio::test]
async fn test_http_feed_source_rejects_error_status() {
    let router = Router::new().route("/feed.xml", get(|| async { StatusCode::NOT_FOUND }));
    let base = spawn_server(router).await;

    let source = HttpFeedSource::new().unwrap();
    let err = source
        .fetch(&format!("{base}/feed.xml"))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Feed(_)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_http_feed_source_rejects_garbage() {
    let router = Router::new().route("/feed.xml", get(|| async { "this is not a feed" }));
    let base = spawn_server(router).await;

    let source = HttpFeedSource::new().unwrap();
    let result = source.fetch(&format!("{base}/feed.xml")).await;
    assert!(matches!(result, Err(RelayError::Feed(_))));
}

async fn capture_note(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    captured.lock().unwrap().push(body);
    Json(json!({ "createdNote": { "id": "9abc" } }))
}

#[tokio::test]
async fn test_misskey_client_posts_note() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route("/api/notes/create", post(capture_note))
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    let client = MisskeyClient::new(&base, "secret-token", true, Duration::from_secs(5)).unwrap();
    let note = Note::new("📰 Hello\nhttps://example.tld/1", Visibility::Followers);
    client.post(&note).await.unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(
        captured[0],
        json!({
            "i": "secret-token",
            "text": "📰 Hello\nhttps://example.tld/1",
            "visibility": "followers",
            "localOnly": true
        })
    );
}

#[tokio::test]
async fn test_misskey_client_reports_error_status() {
    let router = Router::new().route(
        "/api/notes/create",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "code": "CREDENTIAL_REQUIRED" } })),
            )
        }),
    );
    let base = spawn_server(router).await;

    let client = MisskeyClient::new(&base, "bad-token", false, Duration::from_secs(5)).unwrap();
    let err = client
        .post(&Note::new("text", Visibility::Home))
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Delivery(_)));
    assert!(err.to_string().contains("401"));
    assert!(err.to_string().contains("CREDENTIAL_REQUIRED"));
}

async fn gemini_generate(
    Path(model_action): Path<String>,
    headers: HeaderMap,
    State(captured): State<Captured>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (StatusCode::FORBIDDEN, Json(json!({}))).into_response();
    }
    captured
        .lock()
        .unwrap()
        .push(json!({ "path": model_action, "body": body }));

    Json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "  A concise summary.  " }] }
        }]
    }))
    .into_response()
}

fn gemini_config(api_key: &str) -> SummarizerConfig {
    SummarizerConfig {
        provider: "gemini".to_string(),
        api_key: api_key.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_gemini_summarizer_calls_generate_content() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route("/v1beta/models/:model_action", post(gemini_generate))
        .with_state(captured.clone());
    let base = spawn_server(router).await;

    let summarizer = GeminiSummarizer::new(&gemini_config("test-key"))
        .unwrap()
        .with_base_url(format!("{base}/"));
    let summary = summarizer
        .summarize("Rust 1.80 was released today.", "Rust release")
        .await
        .unwrap();

    assert_eq!(summary, "A concise summary.");

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0]["path"], "gemini-1.5-flash:generateContent");
    let prompt = captured[0]["body"]["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap();
    assert!(prompt.contains("Rust release"));
    assert!(prompt.contains("Rust 1.80 was released today."));
}

#[tokio::test]
async fn test_gemini_summarizer_error_status() {
    let captured: Captured = Arc::default();
    let router = Router::new()
        .route("/v1beta/models/:model_action", post(gemini_generate))
        .with_state(captured);
    let base = spawn_server(router).await;

    let summarizer = GeminiSummarizer::new(&gemini_config("wrong-key"))
        .unwrap()
        .with_base_url(base);
    let err = summarizer.summarize("text", "title").await.unwrap_err();

    assert!(matches!(err, RelayError::Summarize(_)));
    assert!(err.to_string().contains("403"));
}

#[tokio::test]
async fn test_gemini_summarizer_empty_candidates() {
    let router = Router::new().route(
        "/v1beta/models/:model_action",
        post(|| async { Json(json!({ "candidates": [] })) }),
    );
    let base = spawn_server(router).await;

    let summarizer = GeminiSummarizer::new(&gemini_config("test-key"))
        .unwrap()
        .with_base_url(base);
    let result = summarizer.summarize("text", "title").await;
    assert!(matches!(result, Err(RelayError::Summarize(_))));
}

#[tokio::test]
async fn test_content_fetcher_extracts_article() {
    let paragraph = "Feed relays keep communities informed. ".repeat(5);
    let page = format!(
        "<html><head><title>Page</title><style>p {{ color: red; }}</style></head>\
         <body><nav>Home | About</nav><article><h1>Headline</h1><p>{paragraph}</p></article>\
         <footer>Copyright</footer></body></html>"
    );

    let router = Router::new()
        .route(
            "/article",
            get(move || {
                let page = page.clone();
                async move { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page) }
            }),
        )
        .route("/empty", get(|| async { "<html><body></body></html>" }))
        .route("/gone", get(|| async { StatusCode::GONE }));
    let base = spawn_server(router).await;

    let fetcher = HtmlContentFetcher::new(Duration::from_secs(5)).unwrap();

    let text = fetcher.fetch_text(&format!("{base}/article")).await.unwrap();
    assert!(text.starts_with("Headline Feed relays keep communities informed."));
    assert!(!text.contains("Home | About"));
    assert!(!text.contains("Copyright"));

    let empty = fetcher.fetch_text(&format!("{base}/empty")).await;
    assert!(matches!(empty, Err(RelayError::Content(_))));

    let gone = fetcher.fetch_text(&format!("{base}/gone")).await;
    assert!(matches!(gone, Err(RelayError::Content(_))));
}
