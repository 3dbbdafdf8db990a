mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::TestApp;

fn setting(port: i64) -> Value {
    json!({
        "host": "smtp.example.com",
        "port": port,
        "username": "ada",
        "password": "hunter22",
        "display_name": "Ada",
        "from_email": "ada@example.com"
    })
}

#[tokio::test]
async fn out_of_range_port_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");

    for port in [0, -25, 65536, 100_000] {
        let (status, body) = app.post("/api/smtp-settings", &token, setting(port)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "port {port}");
        assert_eq!(body["error"], "port must be between 1 and 65535");
    }
    assert!(app.state.db.list_smtp_settings(&id.to_string()).unwrap().is_empty());

    let (status, created) = app.post("/api/smtp-settings", &token, setting(587)).await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/smtp-settings/{}", created["id"].as_str().unwrap());

    let (status, _) = app.put(&uri, &token, setting(70_000)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let stored = app.state.db.list_smtp_settings(&id.to_string()).unwrap();
    assert_eq!(stored[0].port, 587);
}

#[tokio::test]
async fn password_is_sealed_and_never_returned() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");

    let (status, body) = app.post("/api/smtp-settings", &token, setting(465)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("password").is_none());
    assert_eq!(body["has_password"], true);
    assert_eq!(body["is_active"], true);

    let rows = app.state.db.list_smtp_settings(&id.to_string()).unwrap();
    let row = &rows[0];
    let sealed = row.password_sealed.as_deref().unwrap();
    assert!(!sealed.contains("hunter22"));
    assert_eq!(app.state.sealer.open(sealed).unwrap(), "hunter22");

    // Updating without a password keeps the stored one
    let mut update = setting(465);
    update["password"] = Value::Null;
    update["host"] = json!("mail.example.com");
    let (status, body) = app
        .put(&format!("/api/smtp-settings/{}", row.id), &token, update)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["host"], "mail.example.com");
    assert_eq!(body["has_password"], true);
}

#[tokio::test]
async fn only_one_setting_is_active() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");

    let (_, first) = app.post("/api/smtp-settings", &token, setting(587)).await;
    let (_, second) = app.post("/api/smtp-settings", &token, setting(2525)).await;
    assert_eq!(first["is_active"], true);
    assert_eq!(second["is_active"], false);

    let mut activate = setting(2525);
    activate["is_active"] = json!(true);
    app.put(&format!("/api/smtp-settings/{}", second["id"].as_str().unwrap()), &token, activate)
        .await;

    let (_, list) = app.get("/api/smtp-settings", &token).await;
    let active: Vec<&Value> = list.as_array().unwrap().iter().filter(|s| s["is_active"] == true).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], second["id"]);
}

#[tokio::test]
async fn settings_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let (_, ada) = app.user("ada");
    let (_, mallory) = app.user("mallory");

    let (_, created) = app.post("/api/smtp-settings", &ada, setting(587)).await;
    let uri = format!("/api/smtp-settings/{}", created["id"].as_str().unwrap());

    let (_, list) = app.get("/api/smtp-settings", &mallory).await;
    assert_eq!(list, json!([]));
    let (status, _) = app.put(&uri, &mallory, setting(25)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post(&format!("{uri}/test"), &mallory, json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&uri, &ada).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn connection_test_reports_failures() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");

    let (_, good) = app.post("/api/smtp-settings", &token, setting(587)).await;
    let mut bad = setting(587);
    bad["host"] = json!("unreachable.test");
    let (_, bad) = app.post("/api/smtp-settings", &token, bad).await;

    let (status, body) = app
        .post(&format!("/api/smtp-settings/{}/test", good["id"].as_str().unwrap()), &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (_, body) = app
        .post(&format!("/api/smtp-settings/{}/test", bad["id"].as_str().unwrap()), &token, json!({}))
        .await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].as_str().unwrap().contains("refused"));
}

#[tokio::test]
async fn malformed_requests_answer_with_error_body() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");

    let (status, body) = app.post("/api/smtp-settings", &token, json!({ "host": "smtp.example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "request body has missing or invalid fields");
    assert!(app.state.db.list_smtp_settings(&id.to_string()).unwrap().is_empty());

    let (status, body) = app.get("/api/campaigns/not-a-uuid", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, body) = app.put("/api/smtp-settings/12345", &token, setting(587)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, body) = app.get("/api/subscriptions?limit=many", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid query string");
}
