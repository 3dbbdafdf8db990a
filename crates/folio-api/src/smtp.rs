use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use folio_db::models::{SmtpSettingInput, SmtpSettingRow};
use folio_types::api::{Claims, SmtpSettingRequest, SmtpTestResponse};
use folio_types::models::SmtpSetting;

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath};
use crate::mailer::SmtpRelay;
use crate::state::AppState;
use crate::validate;

/// A request that passed validation, port narrowed and password sealed.
struct ValidSetting {
    host: String,
    port: u16,
    username: String,
    password_sealed: Option<String>,
    display_name: Option<String>,
    from_email: String,
}

impl ValidSetting {
    fn input(&self, is_active: bool) -> SmtpSettingInput<'_> {
        SmtpSettingInput {
            host: &self.host,
            port: self.port,
            username: &self.username,
            password_sealed: self.password_sealed.as_deref(),
            display_name: self.display_name.as_deref(),
            from_email: &self.from_email,
            is_active,
        }
    }
}

fn check_request(state: &AppState, req: &SmtpSettingRequest) -> ApiResult<ValidSetting> {
    let port = u16::try_from(req.port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ApiError::validation("port must be between 1 and 65535"))?;

    let host = req.host.trim();
    validate::required("host", host)?;
    validate::max_len("host", host, 253)?;
    if host.contains(char::is_whitespace) || host.contains('/') {
        return Err(ApiError::validation("host must be a bare hostname"));
    }
    validate::max_len("username", &req.username, 254)?;

    let from_email = validate::normalize_email(&req.from_email);
    validate::email(&from_email)?;

    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    if let Some(name) = &display_name {
        validate::max_len("display_name", name, 64)?;
    }

    let password_sealed = match req.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            validate::max_len("password", password, 256)?;
            Some(state.sealer.seal(password)?)
        }
        None => None,
    };

    Ok(ValidSetting {
        host: host.to_string(),
        port,
        username: req.username.trim().to_string(),
        password_sealed,
        display_name,
        from_email,
    })
}

/// Connection details for a stored setting, password unsealed.
pub(crate) fn relay_for(state: &AppState, row: &SmtpSettingRow) -> ApiResult<SmtpRelay> {
    let password = row
        .password_sealed
        .as_deref()
        .map(|sealed| state.sealer.open(sealed))
        .transpose()?;
    Ok(SmtpRelay {
        host: row.host.clone(),
        port: u16::try_from(row.port).map_err(|_| anyhow::anyhow!("stored port {} out of range", row.port))?,
        username: row.username.clone(),
        password,
    })
}

/// GET /api/smtp-settings
pub async fn list_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<SmtpSetting>>> {
    let settings = state
        .db
        .list_smtp_settings(&claims.sub.to_string())?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    Ok(Json(settings))
}

/// POST /api/smtp-settings. The first setting a user adds becomes active.
pub async fn create_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SmtpSettingRequest>,
) -> ApiResult<impl IntoResponse> {
    let valid = check_request(&state, &req)?;
    let owner = claims.sub.to_string();

    let is_active = match req.is_active {
        Some(active) => active,
        None => state.db.list_smtp_settings(&owner)?.is_empty(),
    };

    let id = Uuid::new_v4().to_string();
    let row = state.db.insert_smtp_setting(&id, &owner, &valid.input(is_active))?;
    info!("Added SMTP setting {} ({}:{}) for {}", id, row.host, row.port, owner);

    Ok((StatusCode::CREATED, Json(row.into_model())))
}

/// PUT /api/smtp-settings/{id}. Omitting the password keeps the stored one.
pub async fn update_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<SmtpSettingRequest>,
) -> ApiResult<Json<SmtpSetting>> {
    let valid = check_request(&state, &req)?;
    let owner = claims.sub.to_string();

    let current = state
        .db
        .get_smtp_setting(&id.to_string(), &owner)?
        .ok_or(ApiError::NotFound)?;
    let is_active = req.is_active.unwrap_or(current.is_active);

    let row = state
        .db
        .update_smtp_setting(&id.to_string(), &owner, &valid.input(is_active))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_model()))
}

/// DELETE /api/smtp-settings/{id}
pub async fn delete_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.db.delete_smtp_setting(&id.to_string(), &claims.sub.to_string())? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/smtp-settings/{id}/test: open a session with the relay and
/// report whether it accepted us.
pub async fn test_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<SmtpTestResponse>> {
    let row = state
        .db
        .get_smtp_setting(&id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;
    let relay = relay_for(&state, &row)?;

    match state.smtp.test_connection(&relay).await {
        Ok(()) => Ok(Json(SmtpTestResponse { ok: true, error: None })),
        Err(e) => {
            warn!("SMTP test for setting {} failed: {}", id, e);
            Ok(Json(SmtpTestResponse {
                ok: false,
                error: Some(e.to_string()),
            }))
        }
    }
}
