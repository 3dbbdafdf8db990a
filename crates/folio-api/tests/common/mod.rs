#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use folio_api::auth::create_token;
use folio_api::config::Config;
use folio_api::geo::{GeoLocation, GeoLocator};
use folio_api::google::{GoogleApi, GoogleError, TokenSet};
use folio_api::mailer::{MailError, SmtpRelay, SmtpSender};
use folio_api::state::{AppState, AppStateInner};
use folio_api::uploads::Storage;
use folio_crypto::Sealer;
use folio_db::Database;

pub const JWT_SECRET: &str = "integration-test-secret";

#[derive(Default)]
pub struct FakeGoogle {
    pub exchanges: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

#[async_trait]
impl GoogleApi for FakeGoogle {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, GoogleError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == "bad-code" {
            return Err(GoogleError::Api {
                status: 400,
                body: "invalid_grant".into(),
            });
        }
        Ok(TokenSet {
            access_token: format!("access-{code}"),
            refresh_token: Some("refresh-1".into()),
            expires_in: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenSet, GoogleError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(TokenSet {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            expires_in: 3600,
        })
    }

    async fn user_email(&self, _access_token: &str) -> Result<String, GoogleError> {
        Ok("owner@gmail.com".into())
    }

    async fn send_raw(&self, _access_token: &str, message: &[u8]) -> Result<String, GoogleError> {
        let raw = String::from_utf8_lossy(message).into_owned();
        let mut sent = self.sent.lock().unwrap();
        sent.push(raw);
        Ok(format!("msg-{}", sent.len()))
    }
}

/// Records every message; recipients listed in `reject` fail.
#[derive(Default)]
pub struct FakeSmtp {
    pub sent: Mutex<Vec<(String, String)>>,
    pub reject: Mutex<Vec<String>>,
}

#[async_trait]
impl SmtpSender for FakeSmtp {
    async fn send(&self, relay: &SmtpRelay, message: lettre::Message) -> Result<(), MailError> {
        let to = message.envelope().to()[0].to_string();
        if self.reject.lock().unwrap().contains(&to) {
            return Err(MailError::Refused);
        }
        self.sent.lock().unwrap().push((relay.host.clone(), to));
        Ok(())
    }

    async fn test_connection(&self, relay: &SmtpRelay) -> Result<(), MailError> {
        if relay.host == "unreachable.test" {
            Err(MailError::Refused)
        } else {
            Ok(())
        }
    }
}

/// Every address is in Oslo.
pub struct FakeGeo;

#[async_trait]
impl GeoLocator for FakeGeo {
    async fn locate(&self, _ip: IpAddr) -> Option<GeoLocation> {
        Some(GeoLocation {
            country: Some("Norway".into()),
            city: Some("Oslo".into()),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub google: Arc<FakeGoogle>,
    pub smtp: Arc<FakeSmtp>,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let config = Config {
            jwt_secret: JWT_SECRET.into(),
            public_url: "https://folio.test".into(),
            upload_dir: uploads.path().to_path_buf(),
            // Requests carry the visitor address in X-Forwarded-For
            trust_proxy: true,
            ..Default::default()
        };
        let google = Arc::new(FakeGoogle::default());
        let smtp = Arc::new(FakeSmtp::default());

        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            sealer: Sealer::new(&folio_crypto::keys::generate_key()),
            storage: Storage::new(config.upload_dir.clone()).await.unwrap(),
            config,
            google: google.clone(),
            smtp: smtp.clone(),
            geo: Arc::new(FakeGeo),
        });

        Self {
            router: folio_api::router(state.clone()),
            state,
            google,
            smtp,
            _uploads: uploads,
        }
    }

    /// Create an account directly (skipping the slow password hash) and
    /// return its id and a session token.
    pub fn user(&self, username: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(&id.to_string(), username, "not-a-real-hash")
            .unwrap();
        let token = create_token(JWT_SECRET, id, username).unwrap();
        (id, token)
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }
}
