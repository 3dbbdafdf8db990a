use axum::{
    extract::State,
    response::Html,
};

use folio_types::api::ExploreQuery;
use folio_types::themes;

use crate::error::ApiResult;
use crate::extract::{AppPath, AppQuery};
use crate::explore::search;
use crate::middleware::ClientInfo;
use crate::profiles::public_profile;
use crate::render;
use crate::state::AppState;
use crate::visits::record_visit;

/// GET /: landing page listing the most recently updated public profiles.
pub async fn home(State(state): State<AppState>) -> ApiResult<Html<String>> {
    let entries = search(&state, &ExploreQuery::default())?;
    let theme = themes::resolve(themes::DEFAULT_THEME);
    Ok(Html(render::render_directory("Folio", &entries, None, theme, &state.config.public_url)))
}

/// GET /explore?q=: searchable directory of public profiles.
pub async fn explore_page(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ExploreQuery>,
) -> ApiResult<Html<String>> {
    let entries = search(&state, &query)?;
    let theme = themes::resolve(themes::DEFAULT_THEME);
    Ok(Html(render::render_directory(
        "Explore",
        &entries,
        query.q.as_deref(),
        theme,
        &state.config.public_url,
    )))
}

/// GET /{username}: the public profile page. Each render counts as a visit.
pub async fn profile_page(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
    client: ClientInfo,
) -> ApiResult<Html<String>> {
    let profile = public_profile(&state, &username)?;
    let profile_id = profile.id.to_string();
    let blocks: Vec<_> = state
        .db
        .list_blocks(&profile_id)?
        .into_iter()
        .map(|row| row.into_model())
        .collect();

    record_visit(&state, &profile_id, &client).await;

    let theme = themes::resolve(&profile.theme);
    Ok(Html(render::render_page(&profile, &blocks, theme, &state.config.public_url)))
}
