//! Gmail connection lifecycle: consent URL, OAuth callback, status, manual
//! refresh, single sends and disconnect.
//!
//! Tokens are sealed before they touch the database and only opened right
//! before a call to Google.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde_json::{Value, json};
use tracing::{info, warn};

use folio_db::models::{GmailTokensRow, format_timestamp, parse_timestamp};
use folio_types::api::{AuthUrlResponse, Claims, GmailCallbackQuery, GmailStatusResponse, SendEmailRequest};

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppQuery};
use crate::google::{self, TokenSet};
use crate::mailer::OutgoingEmail;
use crate::profiles::ensure_profile;
use crate::state::AppState;
use crate::validate;

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Where a profile stands with Google.
#[derive(Debug, Clone, PartialEq)]
pub enum GmailLink {
    Unauthorized,
    /// Google handed back a code that has not been exchanged yet.
    PendingExchange { code: String },
    Connected {
        email: String,
        connected_at: DateTime<Utc>,
    },
}

impl GmailLink {
    pub fn from_tokens(tokens: Option<&GmailTokensRow>) -> Self {
        match tokens {
            Some(GmailTokensRow {
                access_token: Some(_),
                email: Some(email),
                connected_at,
                ..
            }) => GmailLink::Connected {
                email: email.clone(),
                connected_at: connected_at.as_deref().map(parse_timestamp).unwrap_or_default(),
            },
            _ => GmailLink::Unauthorized,
        }
    }

    /// Validate an OAuth callback for `caller`. A `state` naming anyone else
    /// is rejected outright so a foreign code is never exchanged.
    pub fn from_callback(query: &GmailCallbackQuery, caller: &Claims) -> Result<Self, CallbackFailure> {
        let state_matches = query
            .state
            .as_deref()
            .and_then(|s| s.parse::<uuid::Uuid>().ok())
            .is_some_and(|id| id == caller.sub);
        if !state_matches {
            return Err(CallbackFailure::ForeignState);
        }
        if let Some(error) = &query.error {
            return Err(CallbackFailure::Denied(error.clone()));
        }
        match query.code.as_deref().filter(|c| !c.is_empty()) {
            Some(code) => Ok(GmailLink::PendingExchange { code: code.to_string() }),
            None => Err(CallbackFailure::Denied("missing_code".into())),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum CallbackFailure {
    ForeignState,
    Denied(String),
}

fn dashboard_redirect(state: &AppState, params: &[(&str, &str)]) -> Response {
    let base = format!("{}/dashboard", state.config.public_url);
    let url = Url::parse_with_params(&base, params)
        .map(String::from)
        .unwrap_or(base);
    Redirect::to(&url).into_response()
}

fn error_redirect(state: &AppState, reason: &str) -> Response {
    dashboard_redirect(state, &[("gmail", "error"), ("reason", reason)])
}

fn expiry(tokens: &TokenSet) -> String {
    format_timestamp(Utc::now() + Duration::seconds(tokens.expires_in))
}

/// GET /api/gmail/auth-url
pub async fn auth_url(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AuthUrlResponse>> {
    if state.config.google.client_id.is_empty() {
        return Err(ApiError::validation("Gmail integration is not configured"));
    }
    Ok(Json(AuthUrlResponse {
        url: google::authorize_url(&state.config.google, &claims.sub.to_string()),
    }))
}

/// GET /api/gmail/callback: Google redirects the browser here after consent.
pub async fn callback(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<GmailCallbackQuery>,
) -> ApiResult<Response> {
    let code = match GmailLink::from_callback(&query, &claims) {
        Ok(GmailLink::PendingExchange { code }) => code,
        Ok(_) => return Ok(error_redirect(&state, "unexpected_state")),
        Err(CallbackFailure::ForeignState) => {
            warn!("Gmail callback for {} carried a foreign state", claims.sub);
            return Err(ApiError::validation("OAuth state does not match the signed-in user"));
        }
        Err(CallbackFailure::Denied(reason)) => return Ok(error_redirect(&state, &reason)),
    };

    let tokens = match state.google.exchange_code(&code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Gmail code exchange for {} failed: {}", claims.sub, e);
            return Ok(error_redirect(&state, "token_exchange_failed"));
        }
    };
    let email = match state.google.user_email(&tokens.access_token).await {
        Ok(email) => email,
        Err(e) => {
            warn!("Gmail userinfo for {} failed: {}", claims.sub, e);
            return Ok(error_redirect(&state, "userinfo_failed"));
        }
    };

    let profile = ensure_profile(&state, &claims)?;
    let access_sealed = state.sealer.seal(&tokens.access_token)?;
    let refresh_sealed = tokens
        .refresh_token
        .as_deref()
        .map(|t| state.sealer.seal(t))
        .transpose()?;
    state
        .db
        .set_gmail_connection(&profile.id, &access_sealed, refresh_sealed.as_deref(), &email, &expiry(&tokens))?;
    info!("Connected Gmail {} for {}", email, claims.sub);

    Ok(dashboard_redirect(&state, &[("gmail", "connected")]))
}

/// GET /api/gmail/status
pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<GmailStatusResponse>> {
    let tokens = state.db.get_gmail_tokens(&claims.sub.to_string())?;
    let response = match GmailLink::from_tokens(tokens.as_ref()) {
        GmailLink::Connected { email, connected_at } => GmailStatusResponse {
            connected: true,
            email: Some(email),
            connected_at: Some(connected_at),
        },
        _ => GmailStatusResponse {
            connected: false,
            email: None,
            connected_at: None,
        },
    };
    Ok(Json(response))
}

/// A usable access token for `user_id`, refreshed first when it is about to
/// expire (or when `force` is set).
pub(crate) async fn fresh_access_token(state: &AppState, user_id: &str, force: bool) -> ApiResult<String> {
    let tokens = state
        .db
        .get_gmail_tokens(user_id)?
        .filter(|t| t.email.is_some())
        .ok_or_else(|| ApiError::validation("Gmail is not connected"))?;

    let expires_at = tokens.expires_at.as_deref().map(parse_timestamp);
    let still_valid = expires_at.is_some_and(|at| at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS));
    if let (Some(sealed), true, false) = (&tokens.access_token, still_valid, force) {
        return Ok(state.sealer.open(sealed)?);
    }

    let refresh_token = tokens
        .refresh_token
        .as_deref()
        .map(|sealed| state.sealer.open(sealed))
        .transpose()?
        .ok_or_else(|| ApiError::validation("Gmail access expired, reconnect your account"))?;

    let refreshed = state.google.refresh(&refresh_token).await?;
    let sealed = state.sealer.seal(&refreshed.access_token)?;
    state.db.update_gmail_access_token(user_id, &sealed, &expiry(&refreshed))?;
    info!("Refreshed Gmail access token for {}", user_id);

    Ok(refreshed.access_token)
}

/// POST /api/gmail/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let user_id = claims.sub.to_string();
    fresh_access_token(&state, &user_id, true).await?;
    let expires_at = state
        .db
        .get_gmail_tokens(&user_id)?
        .and_then(|t| t.expires_at)
        .map(|at| parse_timestamp(&at));
    Ok(Json(json!({ "refreshed": true, "expires_at": expires_at })))
}

/// Check subject and body of an outgoing message.
pub(crate) fn check_message(subject: &str, body: &str) -> ApiResult<()> {
    validate::required("subject", subject)?;
    validate::max_len("subject", subject, 200)?;
    validate::required("body", body)?;
    validate::max_len("body", body, 50_000)?;
    Ok(())
}

/// POST /api/gmail/send: one message from the connected mailbox.
pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SendEmailRequest>,
) -> ApiResult<impl IntoResponse> {
    let to = validate::normalize_email(&req.to);
    validate::email(&to)?;
    check_message(&req.subject, &req.body)?;

    let profile = ensure_profile(&state, &claims)?;
    let from_email = profile
        .gmail_email
        .clone()
        .ok_or_else(|| ApiError::validation("Gmail is not connected"))?;
    let token = fresh_access_token(&state, &profile.id, false).await?;

    let message = OutgoingEmail {
        from_name: profile.display_name.clone(),
        from_email,
        to,
        subject: req.subject,
        body: req.body,
    }
    .to_message()?;
    let id = state.google.send_raw(&token, &message.formatted()).await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": id }))))
}

/// POST /api/gmail/validate: does the stored token still open the mailbox
/// we think it does?
pub async fn validate_connection(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Value>> {
    let user_id = claims.sub.to_string();
    let token = fresh_access_token(&state, &user_id, false).await?;
    let stored = state.db.get_gmail_tokens(&user_id)?.and_then(|t| t.email);

    match state.google.user_email(&token).await {
        Ok(email) => {
            let valid = stored.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(&email));
            Ok(Json(json!({ "valid": valid, "email": email })))
        }
        Err(e) => Ok(Json(json!({ "valid": false, "error": e.to_string() }))),
    }
}

/// DELETE /api/gmail
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    if !state.db.clear_gmail_connection(&claims.sub.to_string())? {
        return Err(ApiError::NotFound);
    }
    info!("Disconnected Gmail for {}", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
