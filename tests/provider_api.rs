//! Config API integration tests: auth, validation, versioning, response shape.
//! Drives the router in-process; no sockets involved.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tether::config::{Credential, SchemaLoader};
use tether::provider::auth::authorization_value;
use tether::provider::{router, AccessGuard, ConfigStore, ServerState};
use tower::ServiceExt;

fn admin() -> Credential {
    Credential::Basic {
        username: "admin".to_string(),
        password: "s3cret".to_string(),
    }
}

fn app() -> Router {
    let schema = SchemaLoader::builtin().unwrap().into_schema();
    router(ServerState {
        store: Arc::new(ConfigStore::new(schema)),
        guard: Arc::new(AccessGuard::new(vec![admin()])),
        protect_reads: false,
    })
}

fn post(body: &str, credential: Option<&Credential>) -> Request<Body> {
    let mut builder = Request::post("/config").header("content-type", "application/json");
    if let Some(credential) = credential {
        builder = builder.header("authorization", authorization_value(credential));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    send(app, Request::get(path).body(Body::empty()).unwrap()).await
}

#[tokio::test]
async fn empty_provider_serves_version_zero() {
    let app = app();

    let (status, body) = get(&app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"version": 0, "payload": {}}));
}

#[tokio::test]
async fn set_then_get_returns_new_version() {
    let app = app();

    let (status, body) = send(&app, post(r#"{"rate_limit": 10}"#, Some(&admin()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["payload"], json!({"rate_limit": 10}));
    assert!(body["published_at"].is_string());

    let (status, body) = get(&app, "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["payload"], json!({"rate_limit": 10}));

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health, json!({"status": "ok", "version": 1}));
}

#[tokio::test]
async fn write_requires_credential() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post(r#"{"rate_limit": 10}"#, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("www-authenticate").unwrap(),
        "Basic realm=\"Bot Config\""
    );

    let wrong = Credential::Basic {
        username: "admin".to_string(),
        password: "changeme".to_string(),
    };
    let (status, body) = send(&app, post(r#"{"rate_limit": 10}"#, Some(&wrong))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (_, body) = get(&app, "/config").await;
    assert_eq!(body["version"], 0);
}

#[tokio::test]
async fn malformed_payloads_are_rejected_without_side_effects() {
    let app = app();
    send(&app, post(r#"{"max_units_per_hour": 30}"#, Some(&admin()))).await;

    for bad in [
        "not json",
        "[1, 2, 3]",
        "{}",
        r#"{"max_units_per_hour": 0}"#,
        r#"{"refresh_interval_secs": "often"}"#,
    ] {
        let (status, body) = send(&app, post(bad, Some(&admin()))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {bad}");
        assert_eq!(body["kind"], "validation", "payload {bad}");
    }

    let (_, body) = get(&app, "/config").await;
    assert_eq!(body["version"], 1);
    assert_eq!(body["payload"], json!({"max_units_per_hour": 30}));
}

#[tokio::test]
async fn superseded_versions_stay_readable() {
    let app = app();
    for n in 1..=3 {
        let payload = json!({"generation": n}).to_string();
        send(&app, post(&payload, Some(&admin()))).await;
    }

    let (status, body) = get(&app, "/config/versions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"current": 3, "versions": [1, 2, 3]}));

    let (status, body) = get(&app, "/config/versions/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"], json!({"generation": 2}));

    let (status, body) = get(&app, "/config/versions/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = get(&app(), "/restart").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
