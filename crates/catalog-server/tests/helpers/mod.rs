//! Shared helpers for the catalog server integration tests
//!
//! Each test receives a fresh database from `#[sqlx::test]`; these helpers
//! build the full router on top of it and drive requests through
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use catalog_server::{api, config::Config};
use serde_json::Value;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceExt;

pub const BOUNDARY: &str = "catalog-integration-boundary";

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.webhooks.timeout_secs = 2;
    config
}

/// Full application router backed by `pool`
pub fn create_test_app(pool: PgPool) -> Router {
    create_test_app_with(pool, &test_config())
}

pub fn create_test_app_with(pool: PgPool, config: &Config) -> Router {
    let state = api::AppState::new(pool, config).expect("app state");
    api::create_router(state, config)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await;
    (status, serde_json::from_str(&body).unwrap())
}

pub async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, body) = send(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;
    (status, serde_json::from_str(&body).unwrap())
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", uri, body).await
}

/// POST `content` as the `csv_file` part of a multipart upload. Returns the
/// status and the raw body (JSON on rejection, SSE on acceptance).
pub async fn upload_csv(app: &Router, file_name: &str, content: &str) -> (StatusCode, String) {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"csv_file\"; filename=\"{file_name}\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    send(
        app,
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

/// JSON payloads of every `data:` line in an SSE body
pub fn sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

pub fn products_csv(rows: usize) -> String {
    let mut csv = String::from("Name,SKU,Description\n");
    for i in 0..rows {
        csv.push_str(&format!("Product {i},SKU-{i:05},Description {i}\n"));
    }
    csv
}

/// Payload of the newest `webhook_events` row of `event_type`. Notifications
/// are recorded from a detached task, so this polls for up to two seconds.
pub async fn wait_for_webhook_event(pool: &PgPool, event_type: &str) -> Option<Value> {
    for _ in 0..40 {
        let row: Option<(Value,)> = sqlx::query_as(
            "SELECT payload FROM webhook_events WHERE event_type = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(event_type)
        .fetch_optional(pool)
        .await
        .unwrap();
        if let Some((payload,)) = row {
            return Some(payload);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

pub async fn webhook_event_count(pool: &PgPool, event_type: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events WHERE event_type = $1")
        .bind(event_type)
        .fetch_one(pool)
        .await
        .unwrap()
}
