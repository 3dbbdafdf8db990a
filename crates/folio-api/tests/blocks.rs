mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use common::TestApp;

async fn add(app: &TestApp, token: &str, block_type: &str, data: Value) -> String {
    let (status, body) = app
        .post("/api/blocks", token, json!({ "block_type": block_type, "data": data }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

fn positions(blocks: &Value) -> Vec<(String, i64)> {
    blocks
        .as_array()
        .unwrap()
        .iter()
        .map(|b| (b["id"].as_str().unwrap().to_string(), b["position"].as_i64().unwrap()))
        .collect()
}

#[tokio::test]
async fn blocks_append_in_order() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");

    let a = add(&app, &token, "text", json!({ "content": "hello" })).await;
    let b = add(&app, &token, "link", json!({ "url": "https://ada.dev", "title": "Site" })).await;
    let c = add(&app, &token, "calendar", json!({ "title": "Launch", "date": "" })).await;

    let (_, blocks) = app.get("/api/blocks", &token).await;
    assert_eq!(positions(&blocks), vec![(a, 0), (b, 1), (c, 2)]);
    assert_eq!(blocks[2]["data"]["date"], Value::Null);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");

    let (status, _) = app.post("/api/blocks", &token, json!({ "block_type": "video", "data": {} })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/blocks", &token, json!({ "block_type": "link", "data": { "url": "javascript:x" } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/blocks", &token, json!({ "block_type": "calendar", "data": { "date": "tomorrow" } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_keeps_block_type() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let id = add(&app, &token, "image", json!({ "imageUrl": "https://cdn.example.com/a.png" })).await;

    let (status, body) = app
        .put(
            &format!("/api/blocks/{id}"),
            &token,
            json!({ "data": { "imageUrl": "/uploads/x/y.png", "size": "small" } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["block_type"], "image");
    assert_eq!(body["data"]["imageUrl"], "/uploads/x/y.png");
    assert_eq!(body["data"]["size"], "small");

    let (status, _) = app
        .put(&format!("/api/blocks/{id}"), &token, json!({ "data": { "imageUrl": "ftp://nope" } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reorder_requires_permutation() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let a = add(&app, &token, "text", json!({ "content": "a" })).await;
    let b = add(&app, &token, "text", json!({ "content": "b" })).await;
    let c = add(&app, &token, "text", json!({ "content": "c" })).await;

    let (status, body) = app
        .put("/api/blocks/order", &token, json!({ "block_ids": [c, a, b] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(positions(&body), vec![(c.clone(), 0), (a.clone(), 1), (b.clone(), 2)]);

    for bad in [json!([a, b]), json!([a, a, b]), json!([a, b, c, uuid::Uuid::new_v4()])] {
        let (status, _) = app.put("/api/blocks/order", &token, json!({ "block_ids": bad })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, blocks) = app.get("/api/blocks", &token).await;
    assert_eq!(positions(&blocks), vec![(c, 0), (a, 1), (b, 2)]);
}

#[tokio::test]
async fn delete_recompacts_positions() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let a = add(&app, &token, "text", json!({ "content": "a" })).await;
    let b = add(&app, &token, "text", json!({ "content": "b" })).await;
    let c = add(&app, &token, "text", json!({ "content": "c" })).await;

    let (status, _) = app.delete(&format!("/api/blocks/{b}"), &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, blocks) = app.get("/api/blocks", &token).await;
    assert_eq!(positions(&blocks), vec![(a, 0), (c, 1)]);
}

#[tokio::test]
async fn render_returns_view_and_form() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let id = add(&app, &token, "image", json!({})).await;

    let (status, body) = app.get(&format!("/api/blocks/{id}/render"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert!(body["view"].as_str().unwrap().contains("No image set"));
    assert!(body["form"].as_str().unwrap().contains("data-upload-endpoint=\"/api/uploads\""));
}

#[tokio::test]
async fn blocks_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let (_, ada) = app.user("ada");
    let (_, mallory) = app.user("mallory");
    let id = add(&app, &ada, "text", json!({ "content": "mine" })).await;
    add(&app, &mallory, "text", json!({ "content": "theirs" })).await;

    let uri = format!("/api/blocks/{id}");
    let (status, _) = app.put(&uri, &mallory, json!({ "data": { "content": "pwned" } })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("{uri}/render"), &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Someone else's block id is not part of mallory's permutation
    let (status, _) = app.put("/api/blocks/order", &mallory, json!({ "block_ids": [id] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, blocks) = app.get("/api/blocks", &ada).await;
    assert_eq!(blocks[0]["data"]["content"], "mine");
    let (_, blocks) = app.get("/api/blocks", &mallory).await;
    assert_eq!(blocks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn block_cap_is_enforced() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");
    app.get("/api/profile", &token).await;
    for _ in 0..100 {
        app.state
            .db
            .insert_block(&Uuid::new_v4().to_string(), &id.to_string(), "text", "{}", 100)
            .unwrap()
            .unwrap();
    }

    let (status, body) = app
        .post("/api/blocks", &token, json!({ "block_type": "text", "data": { "content": "one more" } }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "a profile holds at most 100 blocks");
    assert_eq!(app.get("/api/blocks", &token).await.1.as_array().unwrap().len(), 100);
}
