mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use tower::ServiceExt;

use common::TestApp;

fn upload_request(token: &str, content_type: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/uploads")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn uploads_store_images_and_serve_them() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let png = b"\x89PNG\r\n\x1a\nfake image".to_vec();

    let (status, body) = app.send(upload_request(&token, "image/png", png.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/") && url.ends_with(".png"));
    assert_eq!(body["size"], png.len());

    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let served = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(served.as_ref(), png.as_slice());

    let (_, files) = app.get("/api/uploads", &token).await;
    assert_eq!(files[0]["url"], url);

    let (status, _) = app
        .send(upload_request(&token, "text/html", b"<script></script>".to_vec()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversize_upload_is_rejected_with_error_body() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");

    let big = vec![0u8; folio_api::uploads::MAX_UPLOAD_SIZE + 1];
    let (status, body) = app.send(upload_request(&token, "image/png", big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Payload too large");
    assert!(app.state.storage.list(id).await.unwrap().is_empty());

    let (status, body) = app.send(upload_request(&token, "image/png", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "upload is empty");
}
