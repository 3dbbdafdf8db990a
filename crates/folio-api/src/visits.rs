use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use chrono::{Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use folio_db::models::{NewVisit, format_timestamp};
use folio_types::api::{Claims, CountryCount, DayCount, ViewStats, ViewsQuery};

use crate::error::ApiResult;
use crate::extract::{AppPath, AppQuery};
use crate::middleware::ClientInfo;
use crate::profiles::public_profile;
use crate::state::AppState;

const DEFAULT_DAYS: u32 = 30;
const MAX_DAYS: u32 = 365;
const TOP_COUNTRIES: u32 = 10;

/// Append a visit to `profile_id`. Location comes from the client IP when
/// it can be resolved. A failed insert is logged and otherwise ignored, a
/// page view never fails because of analytics.
pub(crate) async fn record_visit(state: &AppState, profile_id: &str, client: &ClientInfo) {
    let location = match client.ip {
        Some(ip) => state.geo.locate(ip).await.unwrap_or_default(),
        None => Default::default(),
    };
    let ip = client.ip.map(|ip| ip.to_string());

    let id = Uuid::new_v4().to_string();
    let visit = NewVisit {
        id: &id,
        profile_id,
        visitor_ip: ip.as_deref(),
        user_agent: client.user_agent.as_deref(),
        country: location.country.as_deref(),
        city: location.city.as_deref(),
    };
    if let Err(e) = state.db.insert_visit(&visit) {
        warn!("Failed to record visit to {}: {:#}", profile_id, e);
    }
}

/// POST /api/profiles/{username}/views (public)
pub async fn record_view(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
    client: ClientInfo,
) -> ApiResult<StatusCode> {
    let profile = public_profile(&state, &username)?;
    record_visit(&state, &profile.id.to_string(), &client).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/analytics/views?days=N
pub async fn view_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<ViewsQuery>,
) -> ApiResult<Json<ViewStats>> {
    let owner = claims.sub.to_string();
    let days = query.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS);
    let since = format_timestamp(Utc::now() - Duration::days(i64::from(days)));

    let total = state.db.count_visits(&owner, None)?;
    let in_range = state.db.count_visits(&owner, Some(&since))?;
    let by_day = state
        .db
        .visits_by_day(&owner, &since)?
        .into_iter()
        .map(|(day, count)| DayCount { day, count })
        .collect();
    let top_countries = state
        .db
        .top_visit_countries(&owner, &since, TOP_COUNTRIES)?
        .into_iter()
        .map(|(country, count)| CountryCount { country, count })
        .collect();

    Ok(Json(ViewStats {
        total,
        in_range,
        days,
        by_day,
        top_countries,
    }))
}
