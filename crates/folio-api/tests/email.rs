mod common;

use std::sync::atomic::Ordering;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use common::TestApp;

/// Follow nothing: return the status and the Location header.
async fn callback(app: &TestApp, token: &str, query: &str) -> (StatusCode, Option<String>) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/gmail/callback?{query}"))
        .header(header::COOKIE, format!("folio_token={token}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    let location = resp
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    (resp.status(), location)
}

async fn connect_gmail(app: &TestApp, id: Uuid, token: &str) {
    app.get("/api/profile", token).await;
    let (status, location) = callback(app, token, &format!("code=good&state={id}")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("https://folio.test/dashboard?gmail=connected"));
}

#[tokio::test]
async fn callback_with_foreign_state_is_rejected_before_exchange() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let (victim, _) = app.user("victim");

    let (status, _) = callback(&app, &token, &format!("code=stolen&state={victim}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = callback(&app, &token, "code=stolen").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.google.exchanges.load(Ordering::SeqCst), 0);

    let (_, body) = app.get("/api/gmail/status", &token).await;
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn callback_connects_and_stores_sealed_tokens() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");
    connect_gmail(&app, id, &token).await;
    assert_eq!(app.google.exchanges.load(Ordering::SeqCst), 1);

    let (_, body) = app.get("/api/gmail/status", &token).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["email"], "owner@gmail.com");
    assert!(body["connected_at"].is_string());

    let tokens = app.state.db.get_gmail_tokens(&id.to_string()).unwrap().unwrap();
    let sealed = tokens.access_token.unwrap();
    assert_ne!(sealed, "access-good");
    assert_eq!(app.state.sealer.open(&sealed).unwrap(), "access-good");

    let (status, _) = app.delete("/api/gmail", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get("/api/gmail/status", &token).await;
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn failed_exchange_redirects_with_reason() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");

    let (status, location) = callback(&app, &token, &format!("code=bad-code&state={id}")).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        location.as_deref(),
        Some("https://folio.test/dashboard?gmail=error&reason=token_exchange_failed")
    );

    let (_, location) = callback(&app, &token, &format!("error=access_denied&state={id}")).await;
    assert_eq!(
        location.as_deref(),
        Some("https://folio.test/dashboard?gmail=error&reason=access_denied")
    );
}

#[tokio::test]
async fn gmail_send_refresh_and_validate() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");
    connect_gmail(&app, id, &token).await;

    let (status, body) = app
        .post(
            "/api/gmail/send",
            &token,
            json!({ "to": "fan@example.com", "subject": "Hello", "body": "New drop today." }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["id"], "msg-1");
    let raw = app.google.sent.lock().unwrap()[0].clone();
    assert!(raw.contains("To: fan@example.com"));
    assert!(raw.contains("From: owner@gmail.com"));

    let (status, body) = app.post("/api/gmail/refresh", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], true);
    assert_eq!(app.google.refreshes.load(Ordering::SeqCst), 1);

    let (_, body) = app.post("/api/gmail/validate", &token, json!({})).await;
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn gmail_send_requires_connection() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    let (status, body) = app
        .post("/api/gmail/send", &token, json!({ "to": "fan@example.com", "subject": "Hi", "body": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Gmail is not connected");
}

async fn smtp_ready(app: &TestApp, token: &str) {
    let (status, _) = app
        .post(
            "/api/smtp-settings",
            token,
            json!({
                "host": "smtp.example.com",
                "port": 587,
                "username": "ada",
                "password": "hunter22",
                "from_email": "ada@example.com"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn subscribe(app: &TestApp, username: &str, email: &str) -> String {
    let (_, body) = app
        .call(
            Method::POST,
            &format!("/api/profiles/{username}/subscribe"),
            None,
            Some(json!({ "email": email })),
        )
        .await;
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn smtp_campaign_reaches_active_subscribers() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    app.get("/api/profile", &token).await;
    smtp_ready(&app, &token).await;

    subscribe(&app, "ada", "a@example.com").await;
    subscribe(&app, "ada", "b@example.com").await;
    let inactive = subscribe(&app, "ada", "c@example.com").await;
    app.put(&format!("/api/subscriptions/{inactive}"), &token, json!({ "is_active": false }))
        .await;
    app.smtp.reject.lock().unwrap().push("b@example.com".into());

    let (status, body) = app
        .post("/api/campaigns", &token, json!({ "subject": "News", "body": "Hello!", "transport": "smtp" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["campaign"]["status"], "partial");
    assert_eq!(body["campaign"]["recipient_count"], 2);
    assert_eq!(body["campaign"]["sent_count"], 1);
    assert_eq!(body["campaign"]["failed_count"], 1);
    assert_eq!(body["sent_emails"].as_array().unwrap().len(), 2);

    let sent = app.smtp.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![("smtp.example.com".to_string(), "a@example.com".to_string())]);

    let (_, list) = app.get("/api/campaigns", &token).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/api/campaigns/{}", body["campaign"]["id"].as_str().unwrap());
    let (status, body) = app.delete(&uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true, "deleted_emails": 2 }));
    let (status, _) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gmail_campaign_to_explicit_recipients() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");
    connect_gmail(&app, id, &token).await;

    let (status, body) = app
        .post(
            "/api/campaigns",
            &token,
            json!({
                "subject": "Tour dates",
                "body": "See you there.",
                "transport": "gmail",
                "recipients": ["one@example.com", "ONE@example.com", "two@example.com"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["campaign"]["status"], "sent");
    assert_eq!(body["campaign"]["recipient_count"], 2);
    assert_eq!(app.google.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn campaign_needs_recipients_and_transport() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    app.get("/api/profile", &token).await;

    let (status, body) = app
        .post("/api/campaigns", &token, json!({ "subject": "News", "body": "Hi", "transport": "smtp" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "campaign has no recipients");

    let (status, body) = app
        .post(
            "/api/campaigns",
            &token,
            json!({ "subject": "News", "body": "Hi", "transport": "smtp", "recipients": ["a@example.com"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no active SMTP setting");
    assert_eq!(app.get("/api/campaigns", &token).await.1, json!([]));
}

#[tokio::test]
async fn deleting_campaign_without_emails_reports_zero() {
    let app = TestApp::new().await;
    let (id, token) = app.user("ada");
    let campaign_id = Uuid::new_v4();
    app.state
        .db
        .insert_campaign(&campaign_id.to_string(), &id.to_string(), "Draft", "Body", "smtp", 0)
        .unwrap();

    let (status, body) = app.delete(&format!("/api/campaigns/{campaign_id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "deleted": true, "deleted_emails": 0 }));
}

#[tokio::test]
async fn campaigns_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let (id, _) = app.user("ada");
    let (_, mallory) = app.user("mallory");
    let campaign_id = Uuid::new_v4().to_string();
    app.state
        .db
        .insert_campaign(&campaign_id, &id.to_string(), "Secret", "Body", "smtp", 1)
        .unwrap();
    app.state
        .db
        .insert_sent_email(&Uuid::new_v4().to_string(), &campaign_id, "fan@example.com", "sent", None)
        .unwrap();

    let uri = format!("/api/campaigns/{campaign_id}");
    assert_eq!(app.get("/api/campaigns", &mallory).await.1, json!([]));
    let (status, _) = app.get(&uri, &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &mallory).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(app.state.db.get_campaign(&campaign_id, &id.to_string()).unwrap().is_some());
}

#[tokio::test]
async fn campaign_is_marked_failed_when_records_cannot_be_stored() {
    let app = TestApp::new().await;
    let (_, token) = app.user("ada");
    app.get("/api/profile", &token).await;
    smtp_ready(&app, &token).await;
    subscribe(&app, "ada", "a@example.com").await;

    app.state
        .db
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_sent_emails BEFORE INSERT ON sent_emails
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )?;
            Ok(())
        })
        .unwrap();

    let (status, body) = app
        .post("/api/campaigns", &token, json!({ "subject": "News", "body": "Hello!", "transport": "smtp" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");

    let (_, list) = app.get("/api/campaigns", &token).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["status"], "failed");
}
