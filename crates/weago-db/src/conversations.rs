use rusqlite::{Connection, OptionalExtension};
use tracing::debug;
use weago_types::ConversationRecord;

use crate::error::{Result, StoreError};
use crate::models::ConversationRow;
use crate::schema::{self, CONVERSATIONS_TABLE};
use crate::store::ConversationStore;
use crate::Database;

impl Database {
    // -- Conversations --

    pub fn ensure_conversation_table(&self) -> Result<()> {
        self.with_conn(|conn| {
            self.ensure_named_table(conn, CONVERSATIONS_TABLE, schema::create_conversation_table)
        })
    }

    pub fn save_conversation(&self, id: &str, record: &ConversationRecord) -> Result<()> {
        let payload = serde_json::to_string(record).map_err(|source| StoreError::Serialization {
            id: id.to_string(),
            source,
        })?;

        self.with_conn(|conn| {
            self.ensure_named_table(conn, CONVERSATIONS_TABLE, schema::create_conversation_table)?;
            conn.execute(
                "INSERT INTO chats (identifier, payload) VALUES (?1, ?2)
                 ON CONFLICT(identifier) DO UPDATE SET payload = excluded.payload",
                (id, &payload),
            )?;
            debug!(jid = %id, turns = record.contents().len(), "Conversation saved");
            Ok(())
        })
    }

    pub fn load_conversation(&self, id: &str) -> Result<Option<ConversationRecord>> {
        let row = self.with_conn(|conn| {
            self.ensure_named_table(conn, CONVERSATIONS_TABLE, schema::create_conversation_table)?;
            query_conversation(conn, id)
        })?;

        let Some(row) = row else {
            debug!(jid = %id, "No stored conversation");
            return Ok(None);
        };

        // Typed decode: turns with no parts or unknown part shapes fail here.
        let record = serde_json::from_str::<ConversationRecord>(&row.payload).map_err(|source| {
            StoreError::Deserialization {
                id: row.identifier,
                source,
            }
        })?;
        Ok(Some(record))
    }

    pub fn delete_conversation(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            self.ensure_named_table(conn, CONVERSATIONS_TABLE, schema::create_conversation_table)?;
            let removed = conn.execute("DELETE FROM chats WHERE identifier = ?1", [id])?;
            Ok(removed > 0)
        })
    }

    /// Identifiers with a stored conversation, oldest row first.
    pub fn conversation_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            self.ensure_named_table(conn, CONVERSATIONS_TABLE, schema::create_conversation_table)?;
            let mut stmt = conn.prepare("SELECT identifier FROM chats ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

impl ConversationStore for Database {
    fn ensure_table(&self) -> Result<()> {
        self.ensure_conversation_table()
    }

    fn save(&self, id: &str, record: &ConversationRecord) -> Result<()> {
        self.save_conversation(id, record)
    }

    fn load(&self, id: &str) -> Result<Option<ConversationRecord>> {
        self.load_conversation(id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.delete_conversation(id).map(|_| ())
    }
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let row = conn
        .query_row(
            "SELECT identifier, payload FROM chats WHERE identifier = ?1",
            [id],
            |row| {
                Ok(ConversationRow {
                    identifier: row.get(0)?,
                    payload: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weago_types::{
        GenerationConfig, HarmBlockThreshold, HarmCategory, Media, Part, Role, SafetySetting, Turn,
    };

    fn record() -> ConversationRecord {
        ConversationRecord::new(
            Turn::new(Role::User, Part::text("persona")),
            vec![
                SafetySetting {
                    category: HarmCategory::Harassment,
                    threshold: HarmBlockThreshold::BlockNone,
                },
                SafetySetting {
                    category: HarmCategory::DangerousContent,
                    threshold: HarmBlockThreshold::BlockNone,
                },
            ],
            GenerationConfig {
                temperature: 0.7,
                top_k: 64,
                top_p: 0.5,
                max_output_tokens: 8192,
                response_mime_type: "text/plain".into(),
            },
        )
    }

    #[test]
    fn missing_row_loads_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_conversation("nobody@s.whatsapp.net").unwrap().is_none());
    }

    #[test]
    fn save_then_load_preserves_every_part_kind() {
        let db = Database::open_in_memory().unwrap();
        let mut rec = record();
        rec.push_turn(Turn::new(Role::User, Part::text("hi")));
        rec.push_turn(Turn::with_media(Role::User, "pic", Some(Media::Image(vec![0xff, 0xd8]))));
        rec.push_turn(Turn::with_media(
            Role::User,
            "clip",
            Some(Media::Video { uri: "https://files/abc".into() }),
        ));
        rec.push_turn(Turn::new(Role::Model, Part::text("hello")));

        db.save_conversation("62811@s.whatsapp.net", &rec).unwrap();
        let loaded = db.load_conversation("62811@s.whatsapp.net").unwrap().unwrap();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn save_overwrites_existing_row() {
        let db = Database::open_in_memory().unwrap();
        let mut rec = record();
        rec.push_turn(Turn::new(Role::User, Part::text("one")));
        db.save_conversation("a@g.us", &rec).unwrap();

        rec.push_turn(Turn::new(Role::Model, Part::text("two")));
        db.save_conversation("a@g.us", &rec).unwrap();

        let loaded = db.load_conversation("a@g.us").unwrap().unwrap();
        assert_eq!(loaded.contents().len(), 2);
        assert_eq!(db.conversation_ids().unwrap(), vec!["a@g.us".to_string()]);
    }

    #[test]
    fn corrupt_payload_is_a_deserialization_error() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_conversation_table().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (identifier, payload) VALUES (?1, ?2)",
                ("bad@g.us", r#"{"contents":[{"role":"user","parts":[]}]}"#),
            )?;
            Ok(())
        })
        .unwrap();

        let err = db.load_conversation("bad@g.us").unwrap_err();
        assert!(err.is_deserialization());
        assert!(!err.is_storage());
    }

    #[test]
    fn delete_removes_row() {
        let db = Database::open_in_memory().unwrap();
        db.save_conversation("x@g.us", &record()).unwrap();
        assert!(db.delete_conversation("x@g.us").unwrap());
        assert!(!db.delete_conversation("x@g.us").unwrap());
        assert!(db.load_conversation("x@g.us").unwrap().is_none());
    }

    #[test]
    fn ensure_table_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_conversation_table().unwrap();
        db.ensure_conversation_table().unwrap();
        let exists = db.with_conn(|conn| Ok(schema::table_exists(conn, CONVERSATIONS_TABLE)?));
        assert!(exists.unwrap());
    }
}
