use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use rand::Rng;
use tracing::info;

use folio_db::models::{ProfileRow, ProfileUpdate};
use folio_types::api::{
    Claims, PageQuery, ProfileListResponse, PublicProfile, PublicProfileResponse, UpdateProfileRequest,
};
use folio_types::models::Profile;
use folio_types::themes;

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::AppState;
use crate::validate;

/// Digits appended to a taken username.
const SUFFIX_LEN: usize = 4;

/// Fetch the caller's profile, creating it with defaults on first use. The
/// account name is taken as the username, with a numeric suffix when another
/// profile already holds it.
pub(crate) fn ensure_profile(state: &AppState, claims: &Claims) -> ApiResult<ProfileRow> {
    let id = claims.sub.to_string();
    if let Some(row) = state.db.get_profile(&id)? {
        return Ok(row);
    }

    // Leave room for the suffix so candidates stay valid usernames
    let base: String = claims
        .username
        .chars()
        .take(validate::USERNAME_MAX_LEN - SUFFIX_LEN)
        .collect();
    let mut candidate = claims.username.clone();
    for _ in 0..5 {
        if validate::username(&candidate).is_ok() && state.db.get_profile_by_username(&candidate)?.is_none() {
            match state.db.insert_profile(&id, &candidate) {
                Ok(()) => {
                    info!("Created profile @{} for {}", candidate, id);
                    break;
                }
                Err(e) if folio_db::is_unique_violation(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if let Some(row) = state.db.get_profile(&id)? {
            // Created concurrently by another request
            return Ok(row);
        }
        candidate = format!("{base}{}", rand::rng().random_range(1000..10000));
    }

    state
        .db
        .get_profile(&id)?
        .ok_or_else(|| ApiError::Conflict("could not pick a free username".into()))
}

/// GET /api/profile
pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(ensure_profile(&state, &claims)?.into_model()))
}

/// PUT /api/profile
pub async fn update_my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    if let Some(username) = &req.username {
        validate::username(username)?;
    }
    if let Some(name) = &req.display_name {
        validate::max_len("display_name", name, 64)?;
    }
    if let Some(bio) = &req.bio {
        validate::max_len("bio", bio, 280)?;
    }
    if let Some(avatar) = req.avatar_url.as_deref().filter(|a| !a.is_empty()) {
        validate::image_url("avatar_url", avatar)?;
    }
    if let Some(theme) = &req.theme {
        if !themes::exists(theme) {
            return Err(ApiError::validation(format!("unknown theme: {theme}")));
        }
    }

    let profile = ensure_profile(&state, &claims)?;

    let update = ProfileUpdate {
        username: req.username,
        display_name: req.display_name.map(Some),
        bio: req.bio.map(Some),
        avatar_url: req.avatar_url.map(|a| Some(a).filter(|a| !a.is_empty())),
        theme: req.theme,
        is_public: req.is_public,
    };
    state.db.update_profile(&profile.id, &update).map_err(|e| {
        if folio_db::is_unique_violation(&e) {
            ApiError::Conflict("username already taken".into())
        } else {
            e.into()
        }
    })?;

    let row = state.db.get_profile(&profile.id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_model()))
}

/// DELETE /api/profile: removes the profile and everything hanging off it.
pub async fn delete_my_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    if !state.db.delete_profile(&claims.sub.to_string())? {
        return Err(ApiError::NotFound);
    }
    info!("Deleted profile of {}", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/profiles
pub async fn list_profiles(
    State(state): State<AppState>,
    AppQuery(page): AppQuery<PageQuery>,
) -> ApiResult<Json<ProfileListResponse>> {
    let (limit, offset) = (page.limit(), page.offset());
    let profiles = state
        .db
        .list_public_profiles(limit, offset)?
        .into_iter()
        .map(|row| PublicProfile::from(row.into_model()))
        .collect();

    Ok(Json(ProfileListResponse { profiles, limit, offset }))
}

/// GET /api/profiles/{username}
pub async fn get_public_profile(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
) -> ApiResult<Json<PublicProfileResponse>> {
    let profile = public_profile(&state, &username)?;
    let blocks = state
        .db
        .list_blocks(&profile.id.to_string())?
        .into_iter()
        .map(|row| row.into_model())
        .collect();

    Ok(Json(PublicProfileResponse {
        profile: profile.into(),
        blocks,
    }))
}

/// A profile visible to anonymous callers. Private and missing profiles are
/// indistinguishable.
pub(crate) fn public_profile(state: &AppState, username: &str) -> ApiResult<Profile> {
    state
        .db
        .get_profile_by_username(username)?
        .filter(|row| row.is_public)
        .map(ProfileRow::into_model)
        .ok_or(ApiError::NotFound)
}
