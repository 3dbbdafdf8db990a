use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{StreamExt, stream};
use tracing::{info, warn};
use uuid::Uuid;

use folio_types::api::{Claims, CampaignDetailResponse, CreateCampaignRequest, DeleteCampaignResponse, Transport};
use folio_types::models::Campaign;

use crate::error::{ApiError, ApiResult};
use crate::extract::{AppJson, AppPath};
use crate::gmail::{check_message, fresh_access_token};
use crate::mailer::{OutgoingEmail, SmtpRelay};
use crate::profiles::ensure_profile;
use crate::smtp::relay_for;
use crate::state::AppState;
use crate::validate;

const MAX_RECIPIENTS: usize = 2000;

/// Messages in flight at once per campaign.
const SEND_CONCURRENCY: usize = 4;

/// How a campaign's messages leave the building.
enum Delivery {
    Gmail { access_token: String },
    Smtp { relay: SmtpRelay },
}

impl Delivery {
    async fn deliver(&self, state: &AppState, email: &OutgoingEmail) -> Result<(), String> {
        let message = email.to_message().map_err(|e| e.to_string())?;
        match self {
            Delivery::Gmail { access_token } => state
                .google
                .send_raw(access_token, &message.formatted())
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Delivery::Smtp { relay } => state.smtp.send(relay, message).await.map_err(|e| e.to_string()),
        }
    }
}

/// Normalized, validated recipients with duplicates dropped, first
/// occurrence wins.
fn explicit_recipients(list: &[String]) -> ApiResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in list {
        let email = validate::normalize_email(raw);
        validate::email(&email)?;
        if seen.insert(email.clone()) {
            out.push(email);
        }
    }
    Ok(out)
}

/// Campaign outcome from per-recipient results.
fn campaign_status(sent: usize, failed: usize) -> &'static str {
    match (sent, failed) {
        (_, 0) => "sent",
        (0, _) => "failed",
        _ => "partial",
    }
}

/// POST /api/campaigns: send one message to every recipient and record each
/// outcome. Recipients default to the caller's active subscribers.
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<CreateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    check_message(&req.subject, &req.body)?;
    let owner = claims.sub.to_string();

    let recipients = match &req.recipients {
        Some(list) => explicit_recipients(list)?,
        None => state.db.active_subscriber_emails(&owner)?,
    };
    if recipients.is_empty() {
        return Err(ApiError::validation("campaign has no recipients"));
    }
    if recipients.len() > MAX_RECIPIENTS {
        return Err(ApiError::validation(format!("a campaign may reach at most {MAX_RECIPIENTS} recipients")));
    }

    let (delivery, from_name, from_email) = match req.transport {
        Transport::Gmail => {
            let profile = ensure_profile(&state, &claims)?;
            let from_email = profile
                .gmail_email
                .clone()
                .ok_or_else(|| ApiError::validation("Gmail is not connected"))?;
            let access_token = fresh_access_token(&state, &owner, false).await?;
            (Delivery::Gmail { access_token }, profile.display_name, from_email)
        }
        Transport::Smtp => {
            let setting = state
                .db
                .active_smtp_setting(&owner)?
                .ok_or_else(|| ApiError::validation("no active SMTP setting"))?;
            let relay = relay_for(&state, &setting)?;
            (Delivery::Smtp { relay }, setting.display_name, setting.from_email)
        }
    };

    let campaign_id = Uuid::new_v4().to_string();
    state.db.insert_campaign(
        &campaign_id,
        &owner,
        &req.subject,
        &req.body,
        req.transport.as_str(),
        recipients.len(),
    )?;
    info!(
        "Sending campaign {} to {} recipients via {}",
        campaign_id,
        recipients.len(),
        req.transport.as_str()
    );

    let (state_ref, delivery_ref) = (&state, &delivery);
    let outcomes: Vec<(String, Result<(), String>)> = stream::iter(recipients)
        .map(|to| {
            let email = OutgoingEmail {
                from_name: from_name.clone(),
                from_email: from_email.clone(),
                to,
                subject: req.subject.clone(),
                body: req.body.clone(),
            };
            async move {
                let outcome = delivery_ref.deliver(state_ref, &email).await;
                (email.to, outcome)
            }
        })
        .buffer_unordered(SEND_CONCURRENCY)
        .collect()
        .await;

    let failed = match record_outcomes(&state, &campaign_id, &outcomes) {
        Ok(failed) => failed,
        Err(e) => {
            // Never leave the campaign stuck in `sending`
            if let Err(status_err) = state.db.set_campaign_status(&campaign_id, &owner, "failed") {
                warn!("Could not mark campaign {} failed: {:#}", campaign_id, status_err);
            }
            return Err(e);
        }
    };

    let status = campaign_status(outcomes.len() - failed, failed);
    state.db.set_campaign_status(&campaign_id, &owner, status)?;
    info!("Campaign {} finished: {} ({} failed)", campaign_id, status, failed);

    Ok((StatusCode::CREATED, Json(campaign_detail(&state, &campaign_id, &owner)?)))
}

/// Store one delivery record per recipient and count the failures.
fn record_outcomes(
    state: &AppState,
    campaign_id: &str,
    outcomes: &[(String, Result<(), String>)],
) -> ApiResult<usize> {
    let mut failed = 0;
    for (to, outcome) in outcomes {
        let (status, error) = match outcome {
            Ok(()) => ("sent", None),
            Err(e) => {
                warn!("Campaign {} to {} failed: {}", campaign_id, to, e);
                failed += 1;
                ("failed", Some(e.as_str()))
            }
        };
        state
            .db
            .insert_sent_email(&Uuid::new_v4().to_string(), campaign_id, to, status, error)?;
    }
    Ok(failed)
}

fn campaign_detail(state: &AppState, id: &str, owner: &str) -> ApiResult<CampaignDetailResponse> {
    let campaign = state.db.get_campaign(id, owner)?.ok_or(ApiError::NotFound)?;
    let sent_emails = state
        .db
        .list_sent_emails(id, owner)?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    Ok(CampaignDetailResponse {
        campaign: campaign.into_model(),
        sent_emails,
    })
}

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<Campaign>>> {
    let campaigns = state
        .db
        .list_campaigns(&claims.sub.to_string())?
        .into_iter()
        .map(|row| row.into_model())
        .collect();
    Ok(Json(campaigns))
}

/// GET /api/campaigns/{id}
pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<CampaignDetailResponse>> {
    Ok(Json(campaign_detail(&state, &id.to_string(), &claims.sub.to_string())?))
}

/// DELETE /api/campaigns/{id}: removes the delivery records, then the campaign.
pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<DeleteCampaignResponse>> {
    let deleted_emails = state
        .db
        .delete_campaign(&id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;
    info!("Deleted campaign {} with {} emails", id, deleted_emails);

    Ok(Json(DeleteCampaignResponse {
        deleted: true,
        deleted_emails,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_outcomes() {
        assert_eq!(campaign_status(3, 0), "sent");
        assert_eq!(campaign_status(0, 3), "failed");
        assert_eq!(campaign_status(2, 1), "partial");
    }

    #[test]
    fn explicit_recipients_are_normalized_and_deduplicated() {
        let list = vec![
            "Fan@Example.com".to_string(),
            " fan@example.com ".to_string(),
            "other@example.com".to_string(),
        ];
        assert_eq!(
            explicit_recipients(&list).unwrap(),
            vec!["fan@example.com".to_string(), "other@example.com".to_string()]
        );
        assert!(explicit_recipients(&["nope".to_string()]).is_err());
    }
}
