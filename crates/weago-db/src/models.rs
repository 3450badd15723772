/// Database row types. These map directly to SQLite rows.
/// Distinct from weago-types models so decoding stays inside this crate.

pub struct ConversationRow {
    pub identifier: String,
    pub payload: String,
}

pub struct SettingsRow {
    pub use_ai: bool,
    pub limit_value: i64,
    pub is_premium: bool,
    pub name: String,
    pub jid: String,
    pub owner_jid: String,
}
