use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public-facing identity owned by one account. The id is the account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: String,
    pub is_public: bool,
    pub gmail_email: Option<String>,
    pub gmail_connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub block_type: String,
    pub position: i64,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub subscriber_email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub source: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// SMTP relay settings as returned to the owner. The password never leaves
/// the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpSetting {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub display_name: Option<String>,
    pub from_email: String,
    pub is_active: bool,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub subject: String,
    pub body: String,
    pub transport: String,
    pub status: String,
    pub recipient_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentEmail {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_email: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}
