use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use folio_db::models::{NewSubscription, SubscriptionUpdate};
use folio_types::api::{
    Claims, SubscribeRequest, SubscriptionListResponse, SubscriptionQuery, UpdateSubscriptionRequest,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
use folio_types::models::Subscription;

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::ClientInfo;
use crate::profiles::public_profile;
use crate::state::AppState;
use crate::validate;

const DEFAULT_SOURCE: &str = "profile_page";
const SOURCES: &[&str] = &["profile_page", "embed", "import", "manual"];

/// POST /api/profiles/{username}/subscribe (public)
pub async fn subscribe(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
    client: ClientInfo,
    AppJson(req): AppJson<SubscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate::normalize_email(&req.email);
    validate::email(&email)?;
    for (field, value, max) in [
        ("name", &req.name, 100),
        ("phone", &req.phone, 32),
        ("country", &req.country, 100),
        ("city", &req.city, 100),
    ] {
        if let Some(value) = value {
            validate::max_len(field, value, max)?;
        }
    }
    let source = req.source.as_deref().unwrap_or(DEFAULT_SOURCE);
    if !SOURCES.contains(&source) {
        return Err(ApiError::validation(format!("unknown source: {source}")));
    }

    let profile = public_profile(&state, &username)?;
    let profile_id = profile.id.to_string();

    let (mut country, mut city) = (non_empty(req.country), non_empty(req.city));
    if country.is_none() && city.is_none() {
        if let Some(ip) = client.ip {
            if let Some(location) = state.geo.locate(ip).await {
                country = location.country;
                city = location.city;
            }
        }
    }

    let id = Uuid::new_v4().to_string();
    let name = non_empty(req.name);
    let phone = non_empty(req.phone);
    let row = state
        .db
        .insert_subscription(&NewSubscription {
            id: &id,
            profile_id: &profile_id,
            email: &email,
            name: name.as_deref(),
            phone: phone.as_deref(),
            country: country.as_deref(),
            city: city.as_deref(),
            source,
        })
        .map_err(|e| {
            if folio_db::is_unique_violation(&e) {
                ApiError::Conflict("already subscribed".into())
            } else {
                e.into()
            }
        })?;
    info!("New subscriber for @{}", profile.username);

    Ok((StatusCode::CREATED, Json(row.into_model())))
}

/// GET /api/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppQuery(query): AppQuery<SubscriptionQuery>,
) -> ApiResult<Json<SubscriptionListResponse>> {
    let owner = claims.sub.to_string();
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let subscriptions = state
        .db
        .list_subscriptions(&owner, query.active, limit, offset)?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    let total = state.db.count_subscriptions(&owner, query.active)?;

    Ok(Json(SubscriptionListResponse { subscriptions, total }))
}

/// PUT /api/subscriptions/{id}
pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateSubscriptionRequest>,
) -> ApiResult<Json<Subscription>> {
    for (field, value, max) in [
        ("name", &req.name, 100),
        ("phone", &req.phone, 32),
        ("country", &req.country, 100),
        ("city", &req.city, 100),
    ] {
        if let Some(value) = value {
            validate::max_len(field, value, max)?;
        }
    }

    let update = SubscriptionUpdate {
        name: req.name,
        phone: req.phone,
        country: req.country,
        city: req.city,
        is_active: req.is_active,
    };
    let row = state
        .db
        .update_subscription(&id.to_string(), &claims.sub.to_string(), &update)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(row.into_model()))
}

/// DELETE /api/subscriptions/{id}
pub async fn delete_subscription(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.db.delete_subscription(&id.to_string(), &claims.sub.to_string())? {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/subscriptions/export: every subscriber of the caller as CSV.
pub async fn export_subscriptions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let owner = claims.sub.to_string();
    let total = state.db.count_subscriptions(&owner, None)?;
    let rows = state
        .db
        .list_subscriptions(&owner, None, u32::try_from(total).unwrap_or(u32::MAX), 0)?;

    let mut csv = String::from("email,name,phone,country,city,source,active,subscribed_at\n");
    for row in rows {
        let s = row.into_model();
        let fields = [
            s.subscriber_email,
            s.name.unwrap_or_default(),
            s.phone.unwrap_or_default(),
            s.country.unwrap_or_default(),
            s.city.unwrap_or_default(),
            s.source,
            s.is_active.to_string(),
            s.created_at.to_rfc3339(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        csv.push_str(&line.join(","));
        csv.push('\n');
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"subscribers.csv\""),
        ],
        csv,
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Quote a CSV field when needed. Leading formula characters are neutralized
/// so spreadsheets do not evaluate subscriber input.
fn csv_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_fields_are_quoted_and_defused() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Doe, Jane"), "\"Doe, Jane\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("=SUM(A1)"), "'=SUM(A1)");
    }

    #[test]
    fn blank_optional_fields_become_none() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some(" Oslo ".into())).as_deref(), Some("Oslo"));
        assert_eq!(non_empty(None), None);
    }
}
