use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Block, Campaign, Profile, SentEmail, Subscription};

// -- JWT Claims --

/// JWT claims issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Pagination --

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

// -- Profiles --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: Option<String>,
    pub is_public: Option<bool>,
}

/// The subset of a profile anyone may see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: String,
}

impl From<Profile> for PublicProfile {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            username: p.username,
            display_name: p.display_name,
            bio: p.bio,
            avatar_url: p.avatar_url,
            theme: p.theme,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PublicProfileResponse {
    pub profile: PublicProfile,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<PublicProfile>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExploreQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExploreEntry {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub block_count: i64,
}

// -- Blocks --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBlockRequest {
    pub block_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBlockRequest {
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorderBlocksRequest {
    pub block_ids: Vec<Uuid>,
}

/// Read-mode view and edit-mode form of one block, as HTML fragments.
#[derive(Debug, Serialize, Deserialize)]
pub struct RenderedBlock {
    pub id: Uuid,
    pub view: String,
    pub form: String,
}

// -- Subscriptions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubscribeRequest {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSubscriptionRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<Subscription>,
    pub total: i64,
}

// -- SMTP settings --

/// Create/update body. `port` is wide so out-of-range values reach validation
/// instead of failing deserialization. A missing password on update keeps the
/// stored one.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpSettingRequest {
    pub host: String,
    pub port: i64,
    pub username: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub from_email: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmtpTestResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- Gmail --

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUrlResponse {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GmailCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GmailStatusResponse {
    pub connected: bool,
    pub email: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// -- Campaigns --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Gmail,
    Smtp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Gmail => "gmail",
            Transport::Smtp => "smtp",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub subject: String,
    pub body: String,
    pub transport: Transport,
    pub recipients: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CampaignDetailResponse {
    pub campaign: Campaign,
    pub sent_emails: Vec<SentEmail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteCampaignResponse {
    pub deleted: bool,
    pub deleted_emails: usize,
}

// -- Visits --

#[derive(Debug, Default, Deserialize)]
pub struct ViewsQuery {
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewStats {
    pub total: i64,
    pub in_range: i64,
    pub days: u32,
    pub by_day: Vec<DayCount>,
    pub top_countries: Vec<CountryCount>,
}

// -- Uploads --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub url: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_is_clamped() {
        let q = PageQuery { limit: Some(5000), offset: None };
        assert_eq!(q.limit(), MAX_PAGE_SIZE);
        assert_eq!(q.offset(), 0);
        assert_eq!(PageQuery::default().limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(PageQuery { limit: Some(0), offset: Some(40) }.limit(), 1);
    }

    #[test]
    fn transport_parses_lowercase() {
        let req: CreateCampaignRequest = serde_json::from_value(serde_json::json!({
            "subject": "Hi",
            "body": "Hello",
            "transport": "smtp"
        }))
        .unwrap();
        assert_eq!(req.transport, Transport::Smtp);
        assert!(req.recipients.is_none());
    }
}
