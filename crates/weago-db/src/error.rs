use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no record found for {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed row for {id}: {reason}")]
    MalformedRow { id: String, reason: String },

    #[error("cannot decode stored conversation for {id}: {source}")]
    Deserialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode conversation for {id}: {source}")]
    Serialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("identifier {0:?} does not yield a usable table name")]
    DegenerateIdentifier(String),

    #[error("record jid {record} does not match identifier {id}")]
    IdentifierMismatch { id: String, record: String },

    #[error("database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_deserialization(&self) -> bool {
        matches!(self, StoreError::Deserialization { .. })
    }

    /// Everything callers should surface as "storage unavailable".
    pub fn is_storage(&self) -> bool {
        !self.is_not_found() && !self.is_deserialization()
    }
}
