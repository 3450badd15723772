use crate::jid::Jid;

/// Message allowance given to a newly seen group.
pub const DEFAULT_LIMIT: i64 = 10;

/// Per-conversation configuration. Gates whether the assistant answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsRecord {
    pub use_ai: bool,
    pub limit: i64,
    pub is_premium: bool,
    pub name: String,
    pub jid: String,
    pub owner_jid: String,
}

impl SettingsRecord {
    /// Defaults for a chat seen for the first time: assistant off.
    /// Direct chats have no owner and store an empty `owner_jid`.
    pub fn for_chat(jid: &Jid, owner: Option<&Jid>, name: impl Into<String>) -> Self {
        Self {
            use_ai: false,
            limit: DEFAULT_LIMIT,
            is_premium: false,
            name: name.into(),
            jid: jid.to_string(),
            owner_jid: owner.map(Jid::to_string).unwrap_or_default(),
        }
    }
}
