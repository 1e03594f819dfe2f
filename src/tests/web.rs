use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

use crate::tests::app::create_app;
use crate::web::{build_router, SharedState};

fn router() -> (axum::Router, tempfile::TempDir) {
    let (app, tmp) = create_app();
    let state = Arc::new(SharedState {
        app: Arc::new(RwLock::new(app)),
    });
    (build_router(state), tmp)
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(router: &axum::Router, email: &str) -> String {
    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": email,
                "username": "tester",
                "password": "long-enough-password"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_requires_bearer_token() {
    let (router, _tmp) = router();

    let response = router
        .clone()
        .oneshot(request("GET", "/api/v1/podcasts", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["message"].as_str().unwrap().contains("authentication"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_register_me_logout_flow() {
    let (router, _tmp) = router();
    let token = register(&router, "flow@example.com").await;

    let response = router
        .clone()
        .oneshot(request("GET", "/api/v1/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "flow@example.com");
    // credentials never leak through the API
    assert!(body.get("password_hash").is_none());

    let response = router
        .clone()
        .oneshot(request("POST", "/api/v1/auth/logout", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // the revoked token no longer authenticates
    let response = router
        .clone()
        .oneshot(request("GET", "/api/v1/auth/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_and_list() {
    let (router, _tmp) = router();
    let token = register(&router, "fetch@example.com").await;

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/podcasts/fetch",
            Some(&token),
            Some(json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["created"], Value::Bool(true));
    assert_eq!(body["podcast"]["title"], "Stub Video");

    let response = router
        .clone()
        .oneshot(request("GET", "/api/v1/podcasts", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_validation_error_envelope() {
    let (router, _tmp) = router();
    let token = register(&router, "invalid@example.com").await;

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/podcasts",
            Some(&token),
            Some(json!({ "url": "https://example.com/nope", "title": "x" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["message"].as_str().unwrap().contains("validation"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_record_is_404_not_500() {
    let (router, _tmp) = router();
    let token = register(&router, "missing@example.com").await;

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            "/api/v1/podcasts/definitely-not-an-id",
            Some(&token),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ownership_across_accounts() {
    let (router, _tmp) = router();
    let alice = register(&router, "alice@example.com").await;

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/podcasts/fetch",
            Some(&alice),
            Some(json!({ "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let podcast_id = body["podcast"]["id"].as_str().unwrap().to_string();

    // second account cannot read the record
    let bob = {
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "email": "bob@example.com",
                    "username": "bobuser",
                    "password": "long-enough-password"
                })),
            ))
            .await
            .unwrap();
        body_json(response).await["token"].as_str().unwrap().to_string()
    };

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/v1/podcasts/{podcast_id}"),
            Some(&bob),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
