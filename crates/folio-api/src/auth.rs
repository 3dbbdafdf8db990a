use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use folio_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, ApiResult};
use crate::extract::AppJson;
use crate::middleware::SESSION_COOKIE;
use crate::state::AppState;
use crate::validate;

const TOKEN_TTL_DAYS: i64 = 30;

pub async fn register(State(state): State<AppState>, AppJson(req): AppJson<RegisterRequest>) -> ApiResult<Response> {
    validate::username(&req.username)?;
    if req.password.len() < 8 || req.password.len() > 128 {
        return Err(ApiError::validation("password must be 8-128 characters"));
    }

    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::Conflict("username already taken".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    state.db.create_user(&user_id.to_string(), &req.username, &password_hash).map_err(|e| {
        if folio_db::is_unique_violation(&e) {
            ApiError::Conflict("username already taken".into())
        } else {
            e.into()
        }
    })?;

    let token = create_token(&state.config.jwt_secret, user_id, &req.username)?;
    info!("Registered {} ({})", req.username, user_id);

    Ok(with_session_cookie(
        (StatusCode::CREATED, Json(RegisterResponse { user_id, token: token.clone() })).into_response(),
        &token,
    ))
}

pub async fn login(State(state): State<AppState>, AppJson(req): AppJson<LoginRequest>) -> ApiResult<Response> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user.id.parse().map_err(|e| anyhow::anyhow!("corrupt user id {}: {}", user.id, e))?;
    let token = create_token(&state.config.jwt_secret, user_id, &user.username)?;

    Ok(with_session_cookie(
        Json(LoginResponse {
            user_id,
            username: user.username,
            token: token.clone(),
        })
        .into_response(),
        &token,
    ))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Browsers coming back from Google only carry cookies, so the token is
/// mirrored into one.
fn with_session_cookie(mut resp: Response, token: &str) -> Response {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        TOKEN_TTL_DAYS * 24 * 3600
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        resp.headers_mut().insert(header::SET_COOKIE, value);
    }
    resp
}
