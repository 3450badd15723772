pub mod conversation;
pub mod events;
pub mod jid;
pub mod settings;

pub use conversation::{
    Blob, ConversationRecord, FileData, GenerationConfig, HarmBlockThreshold, HarmCategory, Media,
    Part, Role, SafetySetting, Turn,
};
pub use jid::Jid;
pub use settings::SettingsRecord;
