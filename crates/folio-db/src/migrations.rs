use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (accounts, profiles, blocks)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE profiles (
                id                      TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                username                TEXT NOT NULL UNIQUE,
                display_name            TEXT,
                bio                     TEXT,
                avatar_url              TEXT,
                theme                   TEXT NOT NULL DEFAULT 'minimal',
                is_public               INTEGER NOT NULL DEFAULT 1,
                gmail_access_token      TEXT,
                gmail_refresh_token     TEXT,
                gmail_email             TEXT,
                gmail_token_expires_at  TEXT,
                gmail_connected_at      TEXT,
                created_at              TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at              TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE profile_blocks (
                id          TEXT PRIMARY KEY,
                profile_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                block_type  TEXT NOT NULL,
                position    INTEGER NOT NULL,
                data        TEXT NOT NULL DEFAULT '{}',
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_blocks_profile ON profile_blocks(profile_id, position);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (subscriptions, email)");
        conn.execute_batch(
            "
            CREATE TABLE subscriptions (
                id                TEXT PRIMARY KEY,
                profile_id        TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                subscriber_email  TEXT NOT NULL,
                name              TEXT,
                phone             TEXT,
                country           TEXT,
                city              TEXT,
                source            TEXT NOT NULL DEFAULT 'profile_page',
                is_active         INTEGER NOT NULL DEFAULT 1,
                created_at        TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(profile_id, subscriber_email)
            );

            CREATE TABLE smtp_settings (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                host             TEXT NOT NULL,
                port             INTEGER NOT NULL,
                username         TEXT NOT NULL,
                password_sealed  TEXT,
                display_name     TEXT,
                from_email       TEXT NOT NULL,
                is_active        INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_smtp_user ON smtp_settings(user_id);

            CREATE TABLE email_campaigns (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                subject          TEXT NOT NULL,
                body             TEXT NOT NULL,
                transport        TEXT NOT NULL,
                status           TEXT NOT NULL DEFAULT 'sending',
                recipient_count  INTEGER NOT NULL DEFAULT 0,
                created_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_campaigns_user ON email_campaigns(user_id, created_at);

            CREATE TABLE sent_emails (
                id               TEXT PRIMARY KEY,
                campaign_id      TEXT NOT NULL REFERENCES email_campaigns(id),
                recipient_email  TEXT NOT NULL,
                status           TEXT NOT NULL,
                error            TEXT,
                sent_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_sent_emails_campaign ON sent_emails(campaign_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (profile visits)");
        conn.execute_batch(
            "
            CREATE TABLE profile_visits (
                id          TEXT PRIMARY KEY,
                profile_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                visitor_ip  TEXT,
                user_agent  TEXT,
                country     TEXT,
                city        TEXT,
                visited_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_visits_profile ON profile_visits(profile_id, visited_at);

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
