//! Database row types. These map directly to SQLite rows; `into_model`
//! converts them to the shared API models.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use folio_types::models::{Block, Campaign, Profile, SentEmail, SmtpSetting, Subscription};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: String,
    pub is_public: bool,
    pub gmail_email: Option<String>,
    pub gmail_connected_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProfileRow {
    pub fn into_model(self) -> Profile {
        Profile {
            id: parse_uuid(&self.id, "profile"),
            username: self.username,
            display_name: self.display_name,
            bio: self.bio,
            avatar_url: self.avatar_url,
            theme: self.theme,
            is_public: self.is_public,
            gmail_email: self.gmail_email,
            gmail_connected_at: self.gmail_connected_at.as_deref().map(parse_timestamp),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

/// Profile field changes. `None` leaves a field untouched; for the nullable
/// text fields `Some(None)` clears it.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub theme: Option<String>,
    pub is_public: Option<bool>,
}

/// Sealed Gmail credentials stored on a profile.
pub struct GmailTokensRow {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<String>,
    pub connected_at: Option<String>,
}

pub struct PublicProfileRow {
    pub profile: ProfileRow,
    pub block_count: i64,
}

pub struct BlockRow {
    pub id: String,
    pub profile_id: String,
    pub block_type: String,
    pub position: i64,
    pub data: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BlockRow {
    pub fn into_model(self) -> Block {
        let data = serde_json::from_str(&self.data).unwrap_or_else(|e| {
            warn!("Corrupt data on block '{}': {}", self.id, e);
            serde_json::Value::Object(Default::default())
        });
        Block {
            id: parse_uuid(&self.id, "block"),
            profile_id: parse_uuid(&self.profile_id, "block profile"),
            block_type: self.block_type,
            position: self.position,
            data,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

#[derive(Debug)]
pub struct SubscriptionRow {
    pub id: String,
    pub profile_id: String,
    pub subscriber_email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub source: String,
    pub is_active: bool,
    pub created_at: String,
}

impl SubscriptionRow {
    pub fn into_model(self) -> Subscription {
        Subscription {
            id: parse_uuid(&self.id, "subscription"),
            profile_id: parse_uuid(&self.profile_id, "subscription profile"),
            subscriber_email: self.subscriber_email,
            name: self.name,
            phone: self.phone,
            country: self.country,
            city: self.city,
            source: self.source,
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

#[derive(Debug)]
pub struct NewSubscription<'a> {
    pub id: &'a str,
    pub profile_id: &'a str,
    pub email: &'a str,
    pub name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub country: Option<&'a str>,
    pub city: Option<&'a str>,
    pub source: &'a str,
}

#[derive(Debug, Default)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub is_active: Option<bool>,
}

pub struct SmtpSettingRow {
    pub id: String,
    pub user_id: String,
    pub host: String,
    pub port: i64,
    pub username: String,
    pub password_sealed: Option<String>,
    pub display_name: Option<String>,
    pub from_email: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SmtpSettingRow {
    pub fn into_model(self) -> SmtpSetting {
        SmtpSetting {
            id: parse_uuid(&self.id, "smtp setting"),
            host: self.host,
            port: u16::try_from(self.port).unwrap_or_else(|_| {
                warn!("Corrupt port {} on smtp setting '{}'", self.port, self.id);
                0
            }),
            username: self.username,
            display_name: self.display_name,
            from_email: self.from_email,
            is_active: self.is_active,
            has_password: self.password_sealed.is_some(),
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        }
    }
}

/// Validated SMTP fields ready to persist. The password is already sealed.
#[derive(Debug)]
pub struct SmtpSettingInput<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: &'a str,
    pub password_sealed: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub from_email: &'a str,
    pub is_active: bool,
}

pub struct CampaignRow {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub transport: String,
    pub status: String,
    pub recipient_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: String,
}

impl CampaignRow {
    pub fn into_model(self) -> Campaign {
        Campaign {
            id: parse_uuid(&self.id, "campaign"),
            subject: self.subject,
            body: self.body,
            transport: self.transport,
            status: self.status,
            recipient_count: self.recipient_count,
            sent_count: self.sent_count,
            failed_count: self.failed_count,
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

pub struct SentEmailRow {
    pub id: String,
    pub campaign_id: String,
    pub recipient_email: String,
    pub status: String,
    pub error: Option<String>,
    pub sent_at: String,
}

impl SentEmailRow {
    pub fn into_model(self) -> SentEmail {
        SentEmail {
            id: parse_uuid(&self.id, "sent email"),
            campaign_id: parse_uuid(&self.campaign_id, "sent email campaign"),
            recipient_email: self.recipient_email,
            status: self.status,
            error: self.error,
            sent_at: parse_timestamp(&self.sent_at),
        }
    }
}

#[derive(Debug)]
pub struct NewVisit<'a> {
    pub id: &'a str,
    pub profile_id: &'a str,
    pub visitor_ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub country: Option<&'a str>,
    pub city: Option<&'a str>,
}

/// Parse a stored timestamp. SQLite's `datetime('now')` has no timezone, so
/// the naive form is read as UTC.
pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", value, e);
            DateTime::default()
        })
}

/// Format a timestamp the way SQLite's `datetime()` does, so stored values
/// compare correctly.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, value, e);
        Uuid::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let naive = parse_timestamp("2026-03-01 12:30:00");
        let rfc = parse_timestamp("2026-03-01T12:30:00Z");
        assert_eq!(naive, rfc);
        assert_eq!(format_timestamp(naive), "2026-03-01 12:30:00");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday"), DateTime::<Utc>::default());
    }
}
