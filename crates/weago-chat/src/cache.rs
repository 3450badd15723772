use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;
use weago_types::{ConversationRecord, Media, Role, Turn};

use crate::template::RecordTemplate;

/// One live conversation plus its persistence bookkeeping.
pub(crate) struct CacheEntry {
    record: ConversationRecord,
    /// Bumped on every appended turn.
    revision: u64,
    /// Revision last written to the store.
    persisted: u64,
}

pub(crate) type SharedEntry = Arc<Mutex<CacheEntry>>;

impl CacheEntry {
    fn new(record: ConversationRecord) -> Self {
        Self {
            record,
            revision: 0,
            persisted: 0,
        }
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.revision != self.persisted
    }

    /// Copy of the record and the revision it reflects.
    pub(crate) fn snapshot(&self) -> (ConversationRecord, u64) {
        (self.record.clone(), self.revision)
    }

    pub(crate) fn mark_persisted(&mut self, revision: u64) {
        self.persisted = self.persisted.max(revision);
    }
}

pub(crate) fn lock_entry(entry: &SharedEntry) -> MutexGuard<'_, CacheEntry> {
    // A panic mid-append leaves the record valid, so keep using it.
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide map from conversation identifier to live record.
///
/// The map lock covers inserting and removing entries. Each entry has its own
/// mutex, so appends to one conversation are serialized without blocking
/// the others.
#[derive(Clone)]
pub struct ConversationCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    entries: RwLock<HashMap<String, SharedEntry>>,
    template: RecordTemplate,
}

impl ConversationCache {
    pub fn new(template: RecordTemplate) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                template,
            }),
        }
    }

    pub fn template(&self) -> &RecordTemplate {
        &self.inner.template
    }

    /// Copy of the live record for `id`, if present.
    pub fn get(&self, id: &str) -> Option<ConversationRecord> {
        let entry = self.entry(id)?;
        let (record, _) = lock_entry(&entry).snapshot();
        Some(record)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Append one turn to `id`, creating the conversation from the template
    /// on first use. Media goes into the same turn as the text.
    ///
    /// Returns the number of turns after the append.
    pub fn add_turn(&self, id: &str, role: Role, text: impl Into<String>, media: Option<Media>) -> usize {
        let entry = self.entry_or_create(id);
        let turn = Turn::with_media(role, text, media);

        let mut entry = lock_entry(&entry);
        entry.record.push_turn(turn);
        entry.revision += 1;
        entry.record.contents().len()
    }

    /// Remove `id` from memory only. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.write().remove(id).is_some();
        if removed {
            debug!(jid = %id, "Conversation evicted from cache");
        }
        removed
    }

    /// Install a record loaded from the store, unless a live entry appeared
    /// meanwhile. Returns a copy of whichever record is now live.
    pub(crate) fn install(&self, id: &str, record: ConversationRecord) -> ConversationRecord {
        let entry = {
            let mut entries = self.write();
            entries
                .entry(id.to_string())
                .or_insert_with(|| {
                    debug!(jid = %id, turns = record.contents().len(), "Conversation loaded into cache");
                    Arc::new(Mutex::new(CacheEntry::new(record)))
                })
                .clone()
        };
        let (record, _) = lock_entry(&entry).snapshot();
        record
    }

    pub(crate) fn entry(&self, id: &str) -> Option<SharedEntry> {
        self.read().get(id).cloned()
    }

    /// Identifier set and entry handles at this instant.
    pub(crate) fn entries(&self) -> Vec<(String, SharedEntry)> {
        self.read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Whether `entry` is still the live entry for `id`.
    pub(crate) fn is_live(&self, id: &str, entry: &SharedEntry) -> bool {
        self.read()
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    fn entry_or_create(&self, id: &str) -> SharedEntry {
        if let Some(entry) = self.entry(id) {
            return entry;
        }

        let mut entries = self.write();
        entries
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(jid = %id, "Starting new conversation");
                Arc::new(Mutex::new(CacheEntry::new(self.inner.template.new_record())))
            })
            .clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedEntry>> {
        self.inner.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedEntry>> {
        self.inner.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
