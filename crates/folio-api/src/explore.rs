use axum::{
    Json,
    extract::State,
};

use folio_types::api::{DEFAULT_PAGE_SIZE, ExploreEntry, ExploreQuery, MAX_PAGE_SIZE, PublicProfile};
use folio_types::themes::{self, Theme};

use crate::error::ApiResult;
use crate::extract::AppQuery;
use crate::state::AppState;
use crate::validate;

/// GET /api/explore?q=&limit=&offset=
pub async fn explore(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ExploreQuery>,
) -> ApiResult<Json<Vec<ExploreEntry>>> {
    Ok(Json(search(&state, &query)?))
}

/// Public profiles matching `query`, paging clamped.
pub(crate) fn search(state: &AppState, query: &ExploreQuery) -> ApiResult<Vec<ExploreEntry>> {
    if let Some(q) = &query.q {
        validate::max_len("q", q, 64)?;
    }
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let entries = state
        .db
        .search_public_profiles(query.q.as_deref(), limit, offset)?
        .into_iter()
        .map(|row| ExploreEntry {
            block_count: row.block_count,
            profile: PublicProfile::from(row.profile.into_model()),
        })
        .collect();
    Ok(entries)
}

/// GET /api/themes
pub async fn list_themes() -> Json<&'static [Theme]> {
    Json(themes::all())
}
