use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::{GmailTokensRow, ProfileRow, ProfileUpdate, PublicProfileRow};

const PROFILE_COLUMNS: &str = "p.id, p.username, p.display_name, p.bio, p.avatar_url, p.theme, p.is_public, \
     p.gmail_email, p.gmail_connected_at, p.created_at, p.updated_at";

impl Database {
    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "id", id))
    }

    pub fn get_profile_by_username(&self, username: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "username", username))
    }

    /// Insert a profile with default settings.
    pub fn insert_profile(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO profiles (id, username) VALUES (?1, ?2)", (id, username))?;
            Ok(())
        })
    }

    /// Apply field changes to the caller's own profile. Returns false when
    /// the profile does not exist.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool> {
        self.with_conn(|conn| {
            let Some(current) = query_profile(conn, "id", id)? else {
                return Ok(false);
            };

            let username = update.username.clone().unwrap_or(current.username);
            let display_name = update.display_name.clone().unwrap_or(current.display_name);
            let bio = update.bio.clone().unwrap_or(current.bio);
            let avatar_url = update.avatar_url.clone().unwrap_or(current.avatar_url);
            let theme = update.theme.clone().unwrap_or(current.theme);
            let is_public = update.is_public.unwrap_or(current.is_public);

            conn.execute(
                "UPDATE profiles
                 SET username = ?2, display_name = ?3, bio = ?4, avatar_url = ?5, theme = ?6,
                     is_public = ?7, updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, username, display_name, bio, avatar_url, theme, is_public],
            )?;
            Ok(true)
        })
    }

    /// Delete a profile together with every row its owner holds. Blocks,
    /// subscriptions and visits cascade; campaign emails do not, so they go
    /// first.
    pub fn delete_profile(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM sent_emails
                 WHERE campaign_id IN (SELECT id FROM email_campaigns WHERE user_id = ?1)",
                [id],
            )?;
            tx.execute("DELETE FROM email_campaigns WHERE user_id = ?1", [id])?;
            tx.execute("DELETE FROM smtp_settings WHERE user_id = ?1", [id])?;
            let deleted = tx.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    pub fn list_public_profiles(&self, limit: u32, offset: u32) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles p
                 WHERE p.is_public = 1
                 ORDER BY p.created_at DESC, p.rowid DESC
                 LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], map_profile)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Public profiles whose username or display name contains `query`,
    /// most recently updated first, with their block counts.
    pub fn search_public_profiles(
        &self,
        query: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PublicProfileRow>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PROFILE_COLUMNS}, COALESCE(b.cnt, 0)
                 FROM profiles p
                 LEFT JOIN (SELECT profile_id, COUNT(*) AS cnt FROM profile_blocks GROUP BY profile_id) b
                     ON b.profile_id = p.id
                 WHERE p.is_public = 1
                   AND (?1 IS NULL
                        OR lower(p.username) LIKE ?1 ESCAPE '\\'
                        OR lower(COALESCE(p.display_name, '')) LIKE ?1 ESCAPE '\\')
                 ORDER BY p.updated_at DESC, p.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, limit, offset], |row| {
                    Ok(PublicProfileRow {
                        profile: map_profile(row)?,
                        block_count: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// `(username, updated_at)` of every public profile, for the sitemap.
    pub fn public_profile_entries(&self) -> Result<Vec<(String, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, updated_at FROM profiles WHERE is_public = 1 ORDER BY username",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Gmail --

    /// Store a completed OAuth exchange. A missing refresh token keeps the
    /// one from an earlier consent.
    pub fn set_gmail_connection(
        &self,
        id: &str,
        access_token_sealed: &str,
        refresh_token_sealed: Option<&str>,
        email: &str,
        expires_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE profiles
                 SET gmail_access_token = ?2,
                     gmail_refresh_token = COALESCE(?3, gmail_refresh_token),
                     gmail_email = ?4,
                     gmail_token_expires_at = ?5,
                     gmail_connected_at = datetime('now'),
                     updated_at = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![id, access_token_sealed, refresh_token_sealed, email, expires_at],
            )?;
            Ok(updated > 0)
        })
    }

    pub fn get_gmail_tokens(&self, id: &str) -> Result<Option<GmailTokensRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT gmail_access_token, gmail_refresh_token, gmail_email,
                            gmail_token_expires_at, gmail_connected_at
                     FROM profiles WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(GmailTokensRow {
                            access_token: row.get(0)?,
                            refresh_token: row.get(1)?,
                            email: row.get(2)?,
                            expires_at: row.get(3)?,
                            connected_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_gmail_access_token(&self, id: &str, access_token_sealed: &str, expires_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE profiles SET gmail_access_token = ?2, gmail_token_expires_at = ?3
                 WHERE id = ?1 AND gmail_refresh_token IS NOT NULL",
                rusqlite::params![id, access_token_sealed, expires_at],
            )?;
            Ok(updated > 0)
        })
    }

    pub fn clear_gmail_connection(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE profiles
                 SET gmail_access_token = NULL, gmail_refresh_token = NULL, gmail_email = NULL,
                     gmail_token_expires_at = NULL, gmail_connected_at = NULL,
                     updated_at = datetime('now')
                 WHERE id = ?1 AND gmail_email IS NOT NULL",
                [id],
            )?;
            Ok(updated > 0)
        })
    }
}

fn query_profile(conn: &Connection, column: &str, value: &str) -> Result<Option<ProfileRow>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.{column} = ?1");
    let row = conn.query_row(&sql, [value], map_profile).optional()?;
    Ok(row)
}

fn map_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        avatar_url: row.get(4)?,
        theme: row.get(5)?,
        is_public: row.get(6)?,
        gmail_email: row.get(7)?,
        gmail_connected_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn escape_like(value: &str) -> String {
    value.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
