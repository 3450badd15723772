pub mod conversations;
pub mod error;
pub mod models;
pub mod sanitize;
pub mod schema;
pub mod settings;
pub mod store;

pub use error::{Result, StoreError};
pub use store::ConversationStore;

use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub struct Database {
    conn: Mutex<Connection>,
    /// Tables confirmed to exist on this connection.
    known_tables: Mutex<HashSet<String>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        info!("Database opened at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            known_tables: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    /// Create `name` with `create` unless it is already known to exist.
    ///
    /// Existence is checked before creating; the create statement itself is
    /// `IF NOT EXISTS` so a table made by another process is tolerated.
    pub(crate) fn ensure_named_table(
        &self,
        conn: &Connection,
        name: &str,
        create: fn(&Connection, &str) -> rusqlite::Result<()>,
    ) -> Result<()> {
        let mut known = self.known_tables.lock().map_err(|_| StoreError::LockPoisoned)?;
        if known.contains(name) {
            return Ok(());
        }

        if schema::table_exists(conn, name)? {
            info!("Table {} exists, using it", name);
        } else {
            info!("Table {} doesn't exist, creating it", name);
            create(conn, name)?;
        }
        known.insert(name.to_string());
        Ok(())
    }
}
