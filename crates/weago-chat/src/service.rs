use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use weago_db::{ConversationStore, Result};
use weago_types::{ConversationRecord, Media, Role};

use crate::cache::{ConversationCache, SharedEntry, lock_entry};
use crate::template::RecordTemplate;

/// Outcome of one pass over the cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub saved: usize,
    pub failed: usize,
    /// Entries with nothing new since their last save.
    pub clean: usize,
    /// Entries deleted between the snapshot and their turn to be saved.
    pub gone: usize,
}

/// Conversation cache backed by a durable store.
///
/// Every write to the store goes through `persist`, which also covers the
/// combined delete. A save therefore never lands after the delete of the
/// same conversation.
pub struct ConversationService {
    cache: ConversationCache,
    store: Arc<dyn ConversationStore>,
    persist: Mutex<()>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>, template: RecordTemplate) -> Self {
        Self {
            cache: ConversationCache::new(template),
            store,
            persist: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    /// Live record for `id`, loading it from the store on a miss.
    ///
    /// A stored payload that cannot be decoded is logged and treated as
    /// absent; the next turn starts a fresh conversation that overwrites it.
    ///
    /// The load and install run under `persist`, so a delete lands either
    /// before the read or after the install, never between them.
    pub fn get_or_load(&self, id: &str) -> Result<Option<ConversationRecord>> {
        if let Some(record) = self.cache.get(id) {
            return Ok(Some(record));
        }

        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        // A turn or another load may have filled the entry while we waited.
        if let Some(record) = self.cache.get(id) {
            return Ok(Some(record));
        }

        match self.store.load(id) {
            Ok(Some(record)) => Ok(Some(self.cache.install(id, record))),
            Ok(None) => Ok(None),
            Err(e) if e.is_deserialization() => {
                warn!(jid = %id, "Discarding unreadable conversation: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn add_turn(&self, id: &str, role: Role, text: impl Into<String>, media: Option<Media>) -> usize {
        self.cache.add_turn(id, role, text, media)
    }

    pub fn snapshot(&self, id: &str) -> Option<ConversationRecord> {
        self.cache.get(id)
    }

    /// Write `id` to the store now. Returns `false` if it is not cached.
    pub fn save(&self, id: &str) -> Result<bool> {
        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = self.cache.entry(id) else {
            return Ok(false);
        };

        let (record, revision) = lock_entry(&entry).snapshot();
        self.store.save(id, &record)?;
        lock_entry(&entry).mark_persisted(revision);
        Ok(true)
    }

    /// Delete `id` from the store and the cache.
    ///
    /// The row goes first: if that fails nothing changes. Loads hold the
    /// same lock, so none can install a record read before the delete.
    pub fn delete(&self, id: &str) -> Result<()> {
        let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
        self.store.delete(id)?;
        self.cache.remove(id);
        debug!(jid = %id, "Conversation deleted");
        Ok(())
    }

    /// Drop `id` from memory only; the stored row is kept.
    pub fn evict(&self, id: &str) -> bool {
        self.cache.remove(id)
    }

    /// Save every dirty entry present at the start of the pass.
    ///
    /// Entries are saved one at a time; a failed save is logged and the pass
    /// moves on. Callers must not run two passes at once.
    pub fn flush_dirty(&self) -> FlushReport {
        let mut report = FlushReport::default();

        for (id, entry) in self.cache.entries() {
            let _persist = self.persist.lock().unwrap_or_else(PoisonError::into_inner);
            match self.persist_if_dirty(&id, &entry) {
                Persisted::Saved => report.saved += 1,
                Persisted::Clean => report.clean += 1,
                Persisted::Gone => report.gone += 1,
                Persisted::Failed => report.failed += 1,
            }
        }

        report
    }

    fn persist_if_dirty(&self, id: &str, entry: &SharedEntry) -> Persisted {
        if !self.cache.is_live(id, entry) {
            return Persisted::Gone;
        }

        let (record, revision) = {
            let entry = lock_entry(entry);
            if !entry.is_dirty() {
                return Persisted::Clean;
            }
            entry.snapshot()
        };

        match self.store.save(id, &record) {
            Ok(()) => {
                lock_entry(entry).mark_persisted(revision);
                Persisted::Saved
            }
            Err(e) => {
                warn!(jid = %id, "Failed to save conversation: {}", e);
                Persisted::Failed
            }
        }
    }
}

enum Persisted {
    Saved,
    Clean,
    Gone,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use weago_db::Database;

    fn service() -> (Arc<Database>, ConversationService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = ConversationService::new(db.clone(), RecordTemplate::default());
        (db, service)
    }

    #[test]
    fn miss_loads_from_store() {
        let (db, service) = service();
        let mut record = RecordTemplate::default().new_record();
        record.push_turn(weago_types::Turn::new(Role::User, weago_types::Part::text("old")));
        db.save_conversation("a@g.us", &record).unwrap();

        assert!(!service.cache().contains("a@g.us"));
        let loaded = service.get_or_load("a@g.us").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(service.cache().contains("a@g.us"));
    }

    #[test]
    fn miss_without_row_stays_absent() {
        let (_db, service) = service();
        assert!(service.get_or_load("a@g.us").unwrap().is_none());
        assert!(!service.cache().contains("a@g.us"));
    }

    #[test]
    fn loaded_entries_start_clean() {
        let (db, service) = service();
        db.save_conversation("a@g.us", &RecordTemplate::default().new_record()).unwrap();
        service.get_or_load("a@g.us").unwrap();

        let report = service.flush_dirty();
        assert_eq!(report, FlushReport { clean: 1, ..FlushReport::default() });
    }

    #[test]
    fn unreadable_payload_is_treated_as_absent() {
        let (db, service) = service();
        db.ensure_conversation_table().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (identifier, payload) VALUES ('a@g.us', 'not json')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(service.get_or_load("a@g.us").unwrap().is_none());

        service.add_turn("a@g.us", Role::User, "fresh", None);
        assert!(service.save("a@g.us").unwrap());
        let stored = db.load_conversation("a@g.us").unwrap().unwrap();
        assert_eq!(stored.contents().len(), 1);
    }

    #[test]
    fn delete_clears_both_sides() {
        let (db, service) = service();
        service.add_turn("a@g.us", Role::User, "x", None);
        service.save("a@g.us").unwrap();

        service.delete("a@g.us").unwrap();
        assert!(!service.cache().contains("a@g.us"));
        assert!(db.load_conversation("a@g.us").unwrap().is_none());
        assert!(service.get_or_load("a@g.us").unwrap().is_none());
    }

    #[test]
    fn evict_keeps_the_row() {
        let (_db, service) = service();
        service.add_turn("a@g.us", Role::User, "x", None);
        service.save("a@g.us").unwrap();

        assert!(service.evict("a@g.us"));
        let reloaded = service.get_or_load("a@g.us").unwrap().unwrap();
        assert_eq!(reloaded.contents().len(), 1);
    }

    #[test]
    fn sync_save_marks_entry_clean() {
        let (_db, service) = service();
        assert!(!service.save("nobody@g.us").unwrap());

        service.add_turn("a@g.us", Role::User, "x", None);
        assert!(service.save("a@g.us").unwrap());
        assert_eq!(service.flush_dirty().clean, 1);
    }
}
