//! Public endpoints and a real TCP round trip.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use bearer_test_utils::*;
use common::{body_text, TestApp};
use resource_server::handlers::resource::RESOURCE_BODY;
use resource_server::server;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let response = app.get("/health", &[]).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["verification"], "static");
    assert_eq!(body["key_count"], 1);
}

#[tokio::test]
async fn test_health_reports_key_set() {
    let app = TestApp::with_key_set(TestKey::generate("ES384").unwrap(), "k1");
    let response = app.get("/health", &[]).await;
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["verification"], "jwks");
    assert_eq!(body["key_count"], 1);
}

#[tokio::test]
async fn test_metrics_is_public() {
    let app = TestApp::new();
    let response = app.get("/metrics", &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_subpath_is_protected() {
    let app = TestApp::new();
    let response = app.get("/health/details", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_round_trip_over_tcp() -> Result<(), anyhow::Error> {
    let app = TestApp::new();
    let bearer = app.bearer(&TestTokenBuilder::new());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server::serve(listener, app.router.clone(), shutdown.clone()));

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{addr}/data"))
        .header("Authorization", &bearer)
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, RESOURCE_BODY);

    let response = client.get(format!("http://{addr}/data")).send().await?;
    assert_eq!(response.status(), 401);
    assert!(response.headers().contains_key("www-authenticate"));

    shutdown.cancel();
    handle.await??;
    Ok(())
}
