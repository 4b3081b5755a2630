use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use connectotron::config::{config_from_figment, ConfigV1};
use connectotron::routes::create_router;
use connectotron::startup::build_state;
use connectotron::state::AppState;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde_json::{json, Value};
use tower::ServiceExt;

pub fn test_config(backend_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
bind_address: 127.0.0.1:8090
backend:
  base_url: {backend_url}
providers:
  - type: slack
    name: Slack
    client_id: slack-client
    redirect_uri: http://localhost:8090/callback/slack
  - type: google-docs
    name: Google Docs
    client_id: docs-client
    redirect_uri: http://localhost:8090/callback/google-docs
  - type: github
    name: GitHub
    client_id: gh-client
    redirect_uri: http://localhost:8090/callback/github
store:
  type: memory
wizard:
  connected_display_delay_ms: 10
"#
    );
    config_from_figment(Figment::new().merge(Yaml::string(&yaml)))
        .expect("Failed to parse test config YAML")
}

pub async fn build_app(config: ConfigV1) -> (Router, AppState) {
    let state = build_state(Arc::new(config))
        .await
        .expect("state should build");
    (create_router(state.clone()), state)
}

pub fn request(method: Method, path: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(path);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("failed to build request")
}

/// Send a request and decode the JSON body (`Value::Null` when there is none).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should complete");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn login(app: &Router) {
    let (status, body) = send(
        app,
        request(
            Method::POST,
            "/session/login",
            Some(json!({
                "token": "session-1",
                "user": {"id": "u-1", "email": "ada@example.com"}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLoggedIn"], true);
}
