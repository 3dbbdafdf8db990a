use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::{CampaignRow, SentEmailRow};

const CAMPAIGN_SELECT: &str = "SELECT c.id, c.subject, c.body, c.transport, c.status, c.recipient_count,
            (SELECT COUNT(*) FROM sent_emails s WHERE s.campaign_id = c.id AND s.status = 'sent'),
            (SELECT COUNT(*) FROM sent_emails s WHERE s.campaign_id = c.id AND s.status = 'failed'),
            c.created_at
     FROM email_campaigns c";

impl Database {
    pub fn insert_campaign(
        &self,
        id: &str,
        user_id: &str,
        subject: &str,
        body: &str,
        transport: &str,
        recipient_count: usize,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO email_campaigns (id, user_id, subject, body, transport, recipient_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, user_id, subject, body, transport, recipient_count as i64],
            )?;
            Ok(())
        })
    }

    pub fn insert_sent_email(
        &self,
        id: &str,
        campaign_id: &str,
        recipient: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sent_emails (id, campaign_id, recipient_email, status, error)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, campaign_id, recipient, status, error],
            )?;
            Ok(())
        })
    }

    pub fn set_campaign_status(&self, id: &str, user_id: &str, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE email_campaigns SET status = ?3 WHERE id = ?1 AND user_id = ?2",
                (id, user_id, status),
            )?;
            Ok(())
        })
    }

    pub fn list_campaigns(&self, user_id: &str) -> Result<Vec<CampaignRow>> {
        self.with_conn(|conn| {
            let sql = format!("{CAMPAIGN_SELECT} WHERE c.user_id = ?1 ORDER BY c.created_at DESC, c.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_campaign)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_campaign(&self, id: &str, user_id: &str) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| query_campaign(conn, id, user_id))
    }

    /// Delivery records of a campaign, only if `user_id` owns it.
    pub fn list_sent_emails(&self, campaign_id: &str, user_id: &str) -> Result<Vec<SentEmailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.campaign_id, s.recipient_email, s.status, s.error, s.sent_at
                 FROM sent_emails s
                 JOIN email_campaigns c ON c.id = s.campaign_id
                 WHERE s.campaign_id = ?1 AND c.user_id = ?2
                 ORDER BY s.sent_at, s.rowid",
            )?;
            let rows = stmt
                .query_map((campaign_id, user_id), |row| {
                    Ok(SentEmailRow {
                        id: row.get(0)?,
                        campaign_id: row.get(1)?,
                        recipient_email: row.get(2)?,
                        status: row.get(3)?,
                        error: row.get(4)?,
                        sent_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a campaign and its delivery records in one transaction.
    /// Returns the number of records removed, or `None` when the campaign
    /// does not exist for this user.
    pub fn delete_campaign(&self, id: &str, user_id: &str) -> Result<Option<usize>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owned: Option<String> = tx
                .query_row(
                    "SELECT id FROM email_campaigns WHERE id = ?1 AND user_id = ?2",
                    (id, user_id),
                    |r| r.get(0),
                )
                .optional()?;
            if owned.is_none() {
                return Ok(None);
            }

            let emails = tx.execute("DELETE FROM sent_emails WHERE campaign_id = ?1", [id])?;
            tx.execute("DELETE FROM email_campaigns WHERE id = ?1 AND user_id = ?2", (id, user_id))?;
            tx.commit()?;
            Ok(Some(emails))
        })
    }
}

fn query_campaign(conn: &Connection, id: &str, user_id: &str) -> Result<Option<CampaignRow>> {
    let sql = format!("{CAMPAIGN_SELECT} WHERE c.id = ?1 AND c.user_id = ?2");
    let row = conn.query_row(&sql, (id, user_id), map_campaign).optional()?;
    Ok(row)
}

fn map_campaign(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        subject: row.get(1)?,
        body: row.get(2)?,
        transport: row.get(3)?,
        status: row.get(4)?,
        recipient_count: row.get(5)?,
        sent_count: row.get(6)?,
        failed_count: row.get(7)?,
        created_at: row.get(8)?,
    })
}
