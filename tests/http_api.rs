//! HTTP 接口集成测试

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use translator_service::web::{create_router, AppState, WebConfig};

mod common;

use common::{settle, HarnessBuilder, TestHarness};

fn router(harness: &TestHarness) -> (Router, String) {
    let config = WebConfig::from_service_config(harness.context.config());
    let prefix = config.prefix.clone();
    let state = Arc::new(AppState::new(harness.context.clone()));
    (create_router(state, &config), prefix)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let harness = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(get(&format!("{}/health-check", prefix)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!("OK"));
    assert_eq!(prefix, "/api/v0");
}

#[tokio::test]
async fn test_translate_endpoint() {
    let harness = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(post_json(
            &format!("{}/translate", prefix),
            json!({ "texts": ["Hello world.", "good night"], "src_lang": "en", "tgt_lang": "vi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["results"], json!(["[vi] Hello world.", "[vi] good night"]));
    assert_eq!(body["src_lang"], "en");
    assert_eq!(body["tgt_lang"], "vi");
    assert_eq!(body["cache_hits"], 0);
    assert_eq!(body["device"], "fake-cpu");
    assert!(body["time"].as_str().unwrap().ends_with('s'));
}

#[tokio::test]
async fn test_translate_trailing_slash_and_auto_detect() {
    let harness = HarnessBuilder::new().detected_language("fr").build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(post_json(
            &format!("{}/translate/", prefix),
            json!({ "texts": ["Bonjour."], "tgt_lang": "vi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["src_lang"], "fr");
    assert_eq!(body["results"], json!(["[vi] Bonjour."]));
}

#[tokio::test]
async fn test_unsupported_pair_is_bad_request() {
    let harness = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(post_json(
            &format!("{}/translate", prefix),
            json!({ "texts": ["Hello"], "src_lang": "en", "tgt_lang": "ja" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("ja"));
    assert_eq!(harness.constructions(), 0);
}

#[tokio::test]
async fn test_detect_endpoint() {
    let harness = HarnessBuilder::new().detected_language("vi").build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(post_json(
            &format!("{}/detect", prefix),
            json!({ "texts": ["Xin chào thế giới"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["detected_lang"], "vi");
    assert_eq!(body["candidates"][0]["language"], "vi");
    assert_eq!(body["cached"], false);
}

#[tokio::test]
async fn test_languages_and_cache_stats() {
    let harness = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .clone()
        .oneshot(get(&format!("{}/languages", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["pairs"]["en"], json!(["fr", "vi"]));
    assert!(body["names"]["vi"].is_string());

    let response = app
        .oneshot(get(&format!("{}/cache/stats", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["breaker_state"], "closed");
    assert_eq!(body["translation_slots_available"], 5);
}

#[tokio::test]
async fn test_history_endpoint() {
    let disabled = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&disabled);
    let response = app
        .oneshot(get(&format!("{}/translate/history", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let harness = HarnessBuilder::new().with_records().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("{}/translate", prefix),
            json!({ "texts": ["Hello"], "src_lang": "en", "tgt_lang": "fr" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    settle().await;

    let response = app
        .oneshot(get(&format!("{}/translate/history?tgt_lang=fr&limit=5", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["records"][0]["texts"], json!(["Hello"]));
    assert_eq!(body["records"][0]["results"], json!(["[fr] Hello"]));
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let harness = HarnessBuilder::new()
        .config(|config| {
            config.rate_limit.enabled = true;
            config.rate_limit.requests_per_minute = 2;
        })
        .build()
        .await;
    let (app, prefix) = router(&harness);
    let uri = format!("{}/translate", prefix);
    let body = json!({ "texts": ["Hello"], "src_lang": "en", "tgt_lang": "vi" });

    for _ in 0..2 {
        let response = app.clone().oneshot(post_json(&uri, body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(post_json(&uri, body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let payload = read_json(response).await;
    let retry_after = payload["retry_after"].as_u64().unwrap();
    assert!(retry_after >= 1 && retry_after <= 60);
    assert_eq!(
        payload["detail"],
        format!("Too Many Requests, retry after {}", retry_after)
    );

    // 健康检查不计入限额
    let response = app
        .oneshot(get(&format!("{}/health-check", prefix)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overload_maps_to_too_many_requests() {
    let harness = HarnessBuilder::new()
        .config(|config| {
            config.admission.translation_capacity = 1;
            config.admission.translation_timeout_ms = 100;
        })
        .translation_delay(Duration::from_millis(500))
        .build()
        .await;
    let (app, prefix) = router(&harness);
    let uri = format!("{}/translate", prefix);

    let (a, b) = tokio::join!(
        app.clone().oneshot(post_json(
            &uri,
            json!({ "texts": ["First."], "src_lang": "en", "tgt_lang": "vi" })
        )),
        app.clone().oneshot(post_json(
            &uri,
            json!({ "texts": ["Second."], "src_lang": "en", "tgt_lang": "vi" })
        )),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);

    let rejected = if a.status() == StatusCode::TOO_MANY_REQUESTS { a } else { b };
    assert_eq!(
        read_json(rejected).await,
        json!({ "detail": "Server is busy. Please try again later." })
    );
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let harness = HarnessBuilder::new().build().await;
    let (app, prefix) = router(&harness);

    let response = app
        .oneshot(post_json(
            &format!("{}/translate", prefix),
            json!({ "texts": ["Hello"] }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(harness.translate_calls(), 0);
}
