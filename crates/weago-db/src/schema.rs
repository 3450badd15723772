use rusqlite::{Connection, OptionalExtension};

use crate::sanitize::quote;

/// Shared table holding one serialized conversation per identifier.
pub const CONVERSATIONS_TABLE: &str = "chats";

pub fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn create_conversation_table(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {} (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier  TEXT NOT NULL UNIQUE,
            payload     TEXT NOT NULL
        );
        ",
        quote(name)
    ))
}

/// `name` must come from [`crate::sanitize::settings_table_name`].
pub fn create_settings_table(conn: &Connection, name: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {} (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            use_ai       BOOLEAN NOT NULL,
            limit_value  INTEGER NOT NULL,
            is_premium   BOOLEAN NOT NULL,
            name         TEXT NOT NULL,
            jid          TEXT NOT NULL UNIQUE,
            owner_jid    TEXT NOT NULL
        );
        ",
        quote(name)
    ))
}
