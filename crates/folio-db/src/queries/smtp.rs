use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::{SmtpSettingInput, SmtpSettingRow};

const SMTP_COLUMNS: &str = "id, user_id, host, port, username, password_sealed, display_name, from_email, \
     is_active, created_at, updated_at";

impl Database {
    pub fn list_smtp_settings(&self, user_id: &str) -> Result<Vec<SmtpSettingRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SMTP_COLUMNS} FROM smtp_settings WHERE user_id = ?1 ORDER BY created_at, rowid"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_smtp)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_smtp_setting(&self, id: &str, user_id: &str) -> Result<Option<SmtpSettingRow>> {
        self.with_conn(|conn| query_smtp(conn, id, user_id))
    }

    pub fn active_smtp_setting(&self, user_id: &str) -> Result<Option<SmtpSettingRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SMTP_COLUMNS} FROM smtp_settings
                 WHERE user_id = ?1 AND is_active = 1
                 ORDER BY updated_at DESC LIMIT 1"
            );
            let row = conn.query_row(&sql, [user_id], map_smtp).optional()?;
            Ok(row)
        })
    }

    /// Insert a setting. Making it active deactivates the owner's others.
    pub fn insert_smtp_setting(&self, id: &str, user_id: &str, input: &SmtpSettingInput<'_>) -> Result<SmtpSettingRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if input.is_active {
                deactivate_others(&tx, user_id, id)?;
            }
            tx.execute(
                "INSERT INTO smtp_settings
                     (id, user_id, host, port, username, password_sealed, display_name, from_email, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id,
                    user_id,
                    input.host,
                    input.port,
                    input.username,
                    input.password_sealed,
                    input.display_name,
                    input.from_email,
                    input.is_active
                ],
            )?;
            let row = query_smtp(&tx, id, user_id)?
                .ok_or_else(|| anyhow::anyhow!("SMTP setting {} vanished after insert", id))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Overwrite a setting owned by `user_id`. A `None` password keeps the
    /// stored one.
    pub fn update_smtp_setting(
        &self,
        id: &str,
        user_id: &str,
        input: &SmtpSettingInput<'_>,
    ) -> Result<Option<SmtpSettingRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let updated = tx.execute(
                "UPDATE smtp_settings
                 SET host = ?3, port = ?4, username = ?5,
                     password_sealed = COALESCE(?6, password_sealed),
                     display_name = ?7, from_email = ?8, is_active = ?9,
                     updated_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    id,
                    user_id,
                    input.host,
                    input.port,
                    input.username,
                    input.password_sealed,
                    input.display_name,
                    input.from_email,
                    input.is_active
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            if input.is_active {
                deactivate_others(&tx, user_id, id)?;
            }
            let row = query_smtp(&tx, id, user_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn delete_smtp_setting(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM smtp_settings WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }
}

fn deactivate_others(conn: &Connection, user_id: &str, keep_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE smtp_settings SET is_active = 0 WHERE user_id = ?1 AND id != ?2 AND is_active = 1",
        (user_id, keep_id),
    )?;
    Ok(())
}

fn query_smtp(conn: &Connection, id: &str, user_id: &str) -> Result<Option<SmtpSettingRow>> {
    let sql = format!("SELECT {SMTP_COLUMNS} FROM smtp_settings WHERE id = ?1 AND user_id = ?2");
    let row = conn.query_row(&sql, (id, user_id), map_smtp).optional()?;
    Ok(row)
}

fn map_smtp(row: &Row<'_>) -> rusqlite::Result<SmtpSettingRow> {
    Ok(SmtpSettingRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        username: row.get(4)?,
        password_sealed: row.get(5)?,
        display_name: row.get(6)?,
        from_email: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
