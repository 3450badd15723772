use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::jid::Jid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unsupported media kind: {}", other)),
        }
    }
}

/// Raw media downloaded by the transport layer.
#[derive(Debug, Clone)]
pub struct InboundMedia {
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

/// A message delivered by the transport layer.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Conversation the message belongs to (group or direct chat).
    pub chat: Jid,
    /// Group subject or contact name of the chat.
    pub chat_name: String,
    /// Group owner; `None` for direct chats.
    pub chat_owner: Option<Jid>,
    pub sender: Jid,
    /// Display name shown in front of the sender's text.
    pub sender_name: String,
    /// Body text or media caption.
    pub text: String,
    pub media: Option<InboundMedia>,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn conversation_id(&self) -> String {
        self.chat.to_string()
    }
}
