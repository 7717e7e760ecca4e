//! Shared harness for resource server integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Method, Request, Response};
use axum::Router;
use bearer_auth::TokenValidationPipeline;
use bearer_test_utils::*;
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use resource_server::config::{Config, ServiceDocument};
use resource_server::routes::{build_routes, AppState};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// A router built from a real service document on disk.
pub struct TestApp {
    pub router: Router,
    pub key: TestKey,
    pub config: Config,
    dir: TestKeyDir,
}

impl TestApp {
    /// Static-key app with an ES256 issuer key.
    pub fn new() -> Self {
        Self::with_static_key(TestKey::generate("ES256").unwrap(), Value::Null)
    }

    /// Static-key app; members of `extra` are merged into the
    /// authentication block.
    pub fn with_static_key(key: TestKey, extra: Value) -> Self {
        let dir = TestKeyDir::new().unwrap();
        let key_file = dir.write_key("issuer.key", &key).unwrap();
        let block = merge(auth_block(static_verification(key.algorithm(), &key_file)), extra);
        Self::from_document(dir, key, &server_document(block))
    }

    /// Key-set app trusting `key` under `kid`.
    pub fn with_key_set(key: TestKey, kid: &str) -> Self {
        let dir = TestKeyDir::new().unwrap();
        let jwks_file = dir.write_jwks("jwks.json", &[key.jwk(kid).unwrap()]).unwrap();
        let block = auth_block(jwks_verification(&jwks_file));
        Self::from_document(dir, key, &server_document(block))
    }

    fn from_document(dir: TestKeyDir, key: TestKey, document: &Value) -> Self {
        let document_path = dir.write_json("service.json", document).unwrap();
        let vars = HashMap::from([
            (
                "AUTH_CONFIG_PATH".to_string(),
                document_path.display().to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();

        let document = ServiceDocument::load(&config.auth_config_path).unwrap();
        let pipeline = TokenValidationPipeline::initialize(document.into_authentication()).unwrap();
        let state = Arc::new(AppState {
            pipeline: Arc::new(pipeline),
            config: config.clone(),
        });
        // A recorder that is never installed globally, so tests stay independent
        let handle = PrometheusBuilder::new().build_recorder().handle();

        Self {
            router: build_routes(state, handle),
            key,
            config,
            dir,
        }
    }

    /// `Authorization` value carrying a token signed by the trusted key.
    pub fn bearer(&self, builder: &TestTokenBuilder) -> String {
        format!("Bearer {}", builder.sign(&self.key).unwrap())
    }

    /// Send one request through the router.
    pub async fn send(&self, method: Method, uri: &str, authorization: &[&str]) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        for value in authorization {
            request = request.header(AUTHORIZATION, *value);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, authorization: &[&str]) -> Response<Body> {
        self.send(Method::GET, uri, authorization).await
    }
}

fn merge(mut block: Value, extra: Value) -> Value {
    if let (Some(block), Value::Object(extra)) = (block.as_object_mut(), extra) {
        block.extend(extra);
    }
    block
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn challenge(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("www-authenticate")
        .map(|value| value.to_str().unwrap().to_string())
}
