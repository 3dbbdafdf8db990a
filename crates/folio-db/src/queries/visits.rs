use anyhow::Result;

use crate::Database;
use crate::models::NewVisit;

impl Database {
    pub fn insert_visit(&self, visit: &NewVisit<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profile_visits (id, profile_id, visitor_ip, user_agent, country, city)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    visit.id,
                    visit.profile_id,
                    visit.visitor_ip,
                    visit.user_agent,
                    visit.country,
                    visit.city
                ],
            )?;
            Ok(())
        })
    }

    /// Visits recorded at or after `since` (`None` counts all of them).
    pub fn count_visits(&self, profile_id: &str, since: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM profile_visits
                 WHERE profile_id = ?1 AND (?2 IS NULL OR visited_at >= ?2)",
                rusqlite::params![profile_id, since],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    /// `(YYYY-MM-DD, count)` per day since `since`, oldest first.
    pub fn visits_by_day(&self, profile_id: &str, since: &str) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date(visited_at) AS day, COUNT(*) FROM profile_visits
                 WHERE profile_id = ?1 AND visited_at >= ?2
                 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt
                .query_map((profile_id, since), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn top_visit_countries(&self, profile_id: &str, since: &str, limit: u32) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT country, COUNT(*) AS cnt FROM profile_visits
                 WHERE profile_id = ?1 AND visited_at >= ?2 AND country IS NOT NULL
                 GROUP BY country ORDER BY cnt DESC, country
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![profile_id, since, limit], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
