use weago_types::ConversationRecord;

use crate::error::Result;

/// Durable projection of the conversation cache.
///
/// Calls for different identifiers may run concurrently. Calls for the same
/// identifier must be serialized by the caller.
pub trait ConversationStore: Send + Sync {
    fn ensure_table(&self) -> Result<()>;

    /// Insert or overwrite the payload for `id`.
    fn save(&self, id: &str, record: &ConversationRecord) -> Result<()>;

    /// `Ok(None)` when nothing is stored for `id`.
    fn load(&self, id: &str) -> Result<Option<ConversationRecord>>;

    fn delete(&self, id: &str) -> Result<()>;
}
