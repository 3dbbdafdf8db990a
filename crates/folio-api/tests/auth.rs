mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use common::TestApp;

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ada", "password": "analytical-engine" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, profile) = app.get("/api/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], body["user_id"]);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": "ada", "password": "another-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "ada", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": "ada", "password": "analytical-engine" }).to_string()))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("folio_token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn registration_validates_input() {
    let app = TestApp::new().await;
    for body in [
        json!({ "username": "ab", "password": "long-enough" }),
        json!({ "username": "dashboard", "password": "long-enough" }),
        json!({ "username": "ada", "password": "short" }),
    ] {
        let (status, _) = app.call(Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
