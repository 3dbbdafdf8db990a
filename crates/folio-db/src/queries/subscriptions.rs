use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::{NewSubscription, SubscriptionRow, SubscriptionUpdate};

const SUBSCRIPTION_COLUMNS: &str =
    "id, profile_id, subscriber_email, name, phone, country, city, source, is_active, created_at";

impl Database {
    /// Insert a subscriber. A duplicate `(profile_id, email)` surfaces as a
    /// UNIQUE violation, see [`crate::is_unique_violation`].
    pub fn insert_subscription(&self, new: &NewSubscription<'_>) -> Result<SubscriptionRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subscriptions (id, profile_id, subscriber_email, name, phone, country, city, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    new.id, new.profile_id, new.email, new.name, new.phone, new.country, new.city, new.source
                ],
            )?;
            query_subscription(conn, new.id, new.profile_id)?
                .ok_or_else(|| anyhow::anyhow!("Subscription {} vanished after insert", new.id))
        })
    }

    pub fn list_subscriptions(
        &self,
        profile_id: &str,
        active: Option<bool>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
                 WHERE profile_id = ?1 AND (?2 IS NULL OR is_active = ?2)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![profile_id, active, limit, offset], map_subscription)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_subscriptions(&self, profile_id: &str, active: Option<bool>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE profile_id = ?1 AND (?2 IS NULL OR is_active = ?2)",
                rusqlite::params![profile_id, active],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn get_subscription(&self, id: &str, profile_id: &str) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| query_subscription(conn, id, profile_id))
    }

    pub fn update_subscription(
        &self,
        id: &str,
        profile_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Option<SubscriptionRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE subscriptions
                 SET name = COALESCE(?3, name),
                     phone = COALESCE(?4, phone),
                     country = COALESCE(?5, country),
                     city = COALESCE(?6, city),
                     is_active = COALESCE(?7, is_active)
                 WHERE id = ?1 AND profile_id = ?2",
                rusqlite::params![
                    id,
                    profile_id,
                    update.name,
                    update.phone,
                    update.country,
                    update.city,
                    update.is_active
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_subscription(conn, id, profile_id)
        })
    }

    pub fn delete_subscription(&self, id: &str, profile_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM subscriptions WHERE id = ?1 AND profile_id = ?2",
                (id, profile_id),
            )?;
            Ok(deleted > 0)
        })
    }

    pub fn active_subscriber_emails(&self, profile_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT subscriber_email FROM subscriptions
                 WHERE profile_id = ?1 AND is_active = 1
                 ORDER BY created_at, rowid",
            )?;
            let emails = stmt
                .query_map([profile_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(emails)
        })
    }
}

fn query_subscription(conn: &Connection, id: &str, profile_id: &str) -> Result<Option<SubscriptionRow>> {
    let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1 AND profile_id = ?2");
    let row = conn.query_row(&sql, (id, profile_id), map_subscription).optional()?;
    Ok(row)
}

fn map_subscription(row: &Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    Ok(SubscriptionRow {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        subscriber_email: row.get(2)?,
        name: row.get(3)?,
        phone: row.get(4)?,
        country: row.get(5)?,
        city: row.get(6)?,
        source: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        for id in ["u1", "u2"] {
            db.create_user(id, id, "hash").unwrap();
            db.insert_profile(id, id).unwrap();
        }
        db
    }

    fn subscribe(db: &Database, id: &str, profile_id: &str, email: &str) -> Result<SubscriptionRow> {
        db.insert_subscription(&NewSubscription {
            id,
            profile_id,
            email,
            name: None,
            phone: None,
            country: None,
            city: None,
            source: "profile_page",
        })
    }

    #[test]
    fn same_email_once_per_profile() {
        let db = setup();
        subscribe(&db, "s1", "u1", "fan@example.com").unwrap();
        let err = subscribe(&db, "s2", "u1", "fan@example.com").unwrap_err();
        assert!(is_unique_violation(&err));

        // Another profile can have the same subscriber
        subscribe(&db, "s3", "u2", "fan@example.com").unwrap();
        assert_eq!(db.count_subscriptions("u1", None).unwrap(), 1);
    }

    #[test]
    fn update_and_filter_by_active() {
        let db = setup();
        subscribe(&db, "s1", "u1", "a@example.com").unwrap();
        subscribe(&db, "s2", "u1", "b@example.com").unwrap();

        let updated = db
            .update_subscription("s1", "u1", &SubscriptionUpdate { is_active: Some(false), ..Default::default() })
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.subscriber_email, "a@example.com");

        assert_eq!(db.count_subscriptions("u1", Some(true)).unwrap(), 1);
        assert_eq!(db.active_subscriber_emails("u1").unwrap(), vec!["b@example.com".to_string()]);
        assert_eq!(db.list_subscriptions("u1", Some(false), 10, 0).unwrap().len(), 1);
    }

    #[test]
    fn foreign_profile_cannot_touch_subscription() {
        let db = setup();
        subscribe(&db, "s1", "u1", "a@example.com").unwrap();

        assert!(db.get_subscription("s1", "u2").unwrap().is_none());
        assert!(db.update_subscription("s1", "u2", &SubscriptionUpdate::default()).unwrap().is_none());
        assert!(!db.delete_subscription("s1", "u2").unwrap());
        assert!(db.delete_subscription("s1", "u1").unwrap());
    }
}
