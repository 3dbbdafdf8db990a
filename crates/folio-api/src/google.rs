//! Thin client for the Google endpoints the Gmail integration needs:
//! OAuth code exchange and refresh, the userinfo lookup, and Gmail send.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::GoogleConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/userinfo.email",
];

#[derive(Debug, Error)]
pub enum GoogleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Google response missing {0}")]
    Missing(&'static str),
}

/// Tokens from a code exchange or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[async_trait]
pub trait GoogleApi: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, GoogleError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, GoogleError>;

    /// Email address of the account the access token belongs to.
    async fn user_email(&self, access_token: &str) -> Result<String, GoogleError>;

    /// Send an RFC 822 message. Returns the Gmail message id.
    async fn send_raw(&self, access_token: &str, message: &[u8]) -> Result<String, GoogleError>;
}

/// Consent screen URL. `state` comes back untouched on the callback.
pub fn authorize_url(config: &GoogleConfig, state: &str) -> String {
    let scope = SCOPES.join(" ");
    Url::parse_with_params(
        AUTH_URL,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("include_granted_scopes", "true"),
            ("state", state),
        ],
    )
    .map(String::from)
    .unwrap_or_else(|_| AUTH_URL.to_string())
}

pub struct GoogleClient {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    pub fn new(config: GoogleConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, GoogleError> {
        let resp = self.http.post(TOKEN_URL).form(form).send().await?;
        let resp = check(resp).await?;
        Ok(resp.json::<TokenSet>().await?)
    }
}

#[async_trait]
impl GoogleApi for GoogleClient {
    async fn exchange_code(&self, code: &str) -> Result<TokenSet, GoogleError> {
        self.token_request(&[
            ("code", code),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("redirect_uri", &self.config.redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, GoogleError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn user_email(&self, access_token: &str) -> Result<String, GoogleError> {
        #[derive(Deserialize)]
        struct UserInfo {
            email: Option<String>,
        }

        let resp = self.http.get(USERINFO_URL).bearer_auth(access_token).send().await?;
        let info: UserInfo = check(resp).await?.json().await?;
        info.email.ok_or(GoogleError::Missing("email"))
    }

    async fn send_raw(&self, access_token: &str, message: &[u8]) -> Result<String, GoogleError> {
        #[derive(Deserialize)]
        struct Sent {
            id: Option<String>,
        }

        let resp = self
            .http
            .post(SEND_URL)
            .bearer_auth(access_token)
            .json(&json!({ "raw": URL_SAFE_NO_PAD.encode(message) }))
            .send()
            .await?;
        let sent: Sent = check(resp).await?.json().await?;
        sent.id.ok_or(GoogleError::Missing("message id"))
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GoogleError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GoogleError::Api {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}
