use std::collections::HashSet;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::BlockRow;

const BLOCK_COLUMNS: &str = "id, profile_id, block_type, position, data, created_at, updated_at";

#[derive(Debug, PartialEq, Eq)]
pub enum ReorderOutcome {
    Reordered,
    /// The ids given were not exactly the profile's blocks.
    NotPermutation,
}

impl Database {
    pub fn list_blocks(&self, profile_id: &str) -> Result<Vec<BlockRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {BLOCK_COLUMNS} FROM profile_blocks
                 WHERE profile_id = ?1
                 ORDER BY position, created_at"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([profile_id], map_block)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_block(&self, id: &str, profile_id: &str) -> Result<Option<BlockRow>> {
        self.with_conn(|conn| query_block(conn, id, profile_id))
    }

    /// Append a block at the end of the profile's list. Returns `None`
    /// without writing when the profile already holds `max_blocks`.
    pub fn insert_block(
        &self,
        id: &str,
        profile_id: &str,
        block_type: &str,
        data: &str,
        max_blocks: usize,
    ) -> Result<Option<BlockRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let position: i64 = tx.query_row(
                "SELECT COUNT(*) FROM profile_blocks WHERE profile_id = ?1",
                [profile_id],
                |r| r.get(0),
            )?;
            if position as usize >= max_blocks {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO profile_blocks (id, profile_id, block_type, position, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, profile_id, block_type, position, data],
            )?;
            let row = query_block(&tx, id, profile_id)?
                .ok_or_else(|| anyhow::anyhow!("Block {} vanished after insert", id))?;
            tx.commit()?;
            Ok(Some(row))
        })
    }

    pub fn update_block_data(&self, id: &str, profile_id: &str, data: &str) -> Result<Option<BlockRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE profile_blocks SET data = ?3, updated_at = datetime('now')
                 WHERE id = ?1 AND profile_id = ?2",
                (id, profile_id, data),
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_block(conn, id, profile_id)
        })
    }

    /// Delete a block and close the gap it leaves in the positions.
    pub fn delete_block(&self, id: &str, profile_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM profile_blocks WHERE id = ?1 AND profile_id = ?2",
                (id, profile_id),
            )?;
            if deleted > 0 {
                let ids = ordered_block_ids(&tx, profile_id)?;
                write_positions(&tx, profile_id, &ids)?;
            }
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    /// Rewrite positions to `0..n` in the given order. The ids must be
    /// exactly the profile's current blocks.
    pub fn reorder_blocks(&self, profile_id: &str, ids: &[String]) -> Result<ReorderOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing: HashSet<String> = ordered_block_ids(&tx, profile_id)?.into_iter().collect();
            let requested: HashSet<&String> = ids.iter().collect();

            if requested.len() != ids.len()
                || existing.len() != ids.len()
                || !ids.iter().all(|id| existing.contains(id))
            {
                return Ok(ReorderOutcome::NotPermutation);
            }

            write_positions(&tx, profile_id, ids)?;
            tx.commit()?;
            Ok(ReorderOutcome::Reordered)
        })
    }
}

fn query_block(conn: &Connection, id: &str, profile_id: &str) -> Result<Option<BlockRow>> {
    let sql = format!("SELECT {BLOCK_COLUMNS} FROM profile_blocks WHERE id = ?1 AND profile_id = ?2");
    let row = conn.query_row(&sql, (id, profile_id), map_block).optional()?;
    Ok(row)
}

fn ordered_block_ids(conn: &Connection, profile_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM profile_blocks WHERE profile_id = ?1 ORDER BY position, created_at",
    )?;
    let ids = stmt
        .query_map([profile_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn write_positions(conn: &Connection, profile_id: &str, ids: &[String]) -> Result<()> {
    let mut stmt = conn.prepare(
        "UPDATE profile_blocks SET position = ?3 WHERE id = ?1 AND profile_id = ?2",
    )?;
    for (position, id) in ids.iter().enumerate() {
        stmt.execute(rusqlite::params![id, profile_id, position as i64])?;
    }
    Ok(())
}

fn map_block(row: &Row<'_>) -> rusqlite::Result<BlockRow> {
    Ok(BlockRow {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        block_type: row.get(2)?,
        position: row.get(3)?,
        data: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
