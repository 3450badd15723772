use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};
use weago_types::{Jid, SettingsRecord};

use crate::error::{Result, StoreError};
use crate::models::SettingsRow;
use crate::sanitize::{quote, settings_table_name};
use crate::schema::{self, table_exists};
use crate::Database;

/// Per-conversation settings, one table per sanitized identifier.
///
/// Identifiers that sanitize to the same name share a table and are told
/// apart by the unique `jid` column.
impl Database {
    // -- Settings --

    /// Create the settings table for `id` if it does not exist yet.
    pub fn ensure_settings_table(&self, id: &str) -> Result<()> {
        let table = settings_table_name(id)?;
        self.with_conn(|conn| self.ensure_named_table(conn, &table, schema::create_settings_table))
    }

    /// Write or replace the settings row for `id`.
    pub fn upsert_settings(&self, id: &str, record: &SettingsRecord) -> Result<()> {
        if record.jid != id {
            return Err(StoreError::IdentifierMismatch {
                id: id.to_string(),
                record: record.jid.clone(),
            });
        }
        let table = settings_table_name(id)?;

        self.with_conn(|conn| {
            self.ensure_named_table(conn, &table, schema::create_settings_table)?;
            conn.execute(
                &format!(
                    "INSERT INTO {} (use_ai, limit_value, is_premium, name, jid, owner_jid)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(jid) DO UPDATE SET
                        use_ai = excluded.use_ai,
                        limit_value = excluded.limit_value,
                        is_premium = excluded.is_premium,
                        name = excluded.name,
                        owner_jid = excluded.owner_jid",
                    quote(&table)
                ),
                rusqlite::params![
                    record.use_ai,
                    record.limit,
                    record.is_premium,
                    record.name,
                    id,
                    record.owner_jid
                ],
            )?;
            debug!(jid = %id, table = %table, use_ai = record.use_ai, "Settings saved");
            Ok(())
        })
    }

    pub fn get_settings(&self, id: &str) -> Result<SettingsRecord> {
        let table = settings_table_name(id)?;

        let row = self.with_conn(|conn| {
            if !table_exists(conn, &table)? {
                return Ok(None);
            }
            query_settings(conn, &table, id)
        })?;

        let row = row.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        settings_from_row(id, row)
    }

    /// Flip the assistant switch on an existing row.
    pub fn set_use_ai(&self, id: &str, enabled: bool) -> Result<()> {
        let table = settings_table_name(id)?;

        let updated = self.with_conn(|conn| {
            if !table_exists(conn, &table)? {
                return Ok(0);
            }
            let n = conn.execute(
                &format!("UPDATE {} SET use_ai = ?1 WHERE jid = ?2", quote(&table)),
                rusqlite::params![enabled, id],
            )?;
            Ok(n)
        })?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        info!(jid = %id, enabled, "Assistant switch changed");
        Ok(())
    }

    /// Remove the row for `id`. The table stays, since other identifiers
    /// may sanitize to the same name. Returns whether a row was removed.
    pub fn delete_settings(&self, id: &str) -> Result<bool> {
        let table = settings_table_name(id)?;

        self.with_conn(|conn| {
            if !table_exists(conn, &table)? {
                return Ok(false);
            }
            let n = conn.execute(&format!("DELETE FROM {} WHERE jid = ?1", quote(&table)), [id])?;
            Ok(n > 0)
        })
    }
}

fn query_settings(conn: &Connection, table: &str, id: &str) -> Result<Option<SettingsRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT use_ai, limit_value, is_premium, name, jid, owner_jid FROM {} WHERE jid = ?1",
        quote(table)
    ))?;

    let row = stmt
        .query_row([id], |row| {
            Ok(SettingsRow {
                use_ai: row.get(0)?,
                limit_value: row.get(1)?,
                is_premium: row.get(2)?,
                name: row.get(3)?,
                jid: row.get(4)?,
                owner_jid: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn settings_from_row(id: &str, row: SettingsRow) -> Result<SettingsRecord> {
    row.jid.parse::<Jid>().map_err(|e| StoreError::MalformedRow {
        id: id.to_string(),
        reason: e.to_string(),
    })?;
    // Direct chats have no owner.
    if !row.owner_jid.is_empty() {
        row.owner_jid.parse::<Jid>().map_err(|e| StoreError::MalformedRow {
            id: id.to_string(),
            reason: format!("owner: {}", e),
        })?;
    }

    Ok(SettingsRecord {
        use_ai: row.use_ai,
        limit: row.limit_value,
        is_premium: row.is_premium,
        name: row.name,
        jid: row.jid,
        owner_jid: row.owner_jid,
    })
}
