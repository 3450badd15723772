use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type attached to inline image parts.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// MIME type attached to video file references.
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inline binary payload. `data` is standard base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Reference to media hosted by the generative backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// One unit of content inside a turn.
///
/// Encoded the way the backend expects it: a single-key object whose key
/// names the variant, e.g. `{"text": "hi"}` or `{"inline_data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Part {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "inline_data")]
    InlineImage(Blob),
    #[serde(rename = "file_data")]
    FileReference(FileData),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    /// Base64-encode raw image bytes into an inline part.
    pub fn inline_image(bytes: &[u8]) -> Self {
        Part::InlineImage(Blob {
            mime_type: IMAGE_MIME_TYPE.to_string(),
            data: B64.encode(bytes),
        })
    }

    pub fn file_reference(mime_type: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Part::FileReference(FileData {
            mime_type: mime_type.into(),
            file_uri: file_uri.into(),
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Media attached to an inbound turn. Images are embedded, videos are
/// referenced by the URI the backend returned after upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Image(Vec<u8>),
    Video { uri: String },
}

impl Media {
    pub fn into_part(self) -> Part {
        match self {
            Media::Image(bytes) => Part::inline_image(&bytes),
            Media::Video { uri } => Part::file_reference(VIDEO_MIME_TYPE, uri),
        }
    }
}

/// A role-tagged exchange unit. Always holds at least one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TurnShape")]
pub struct Turn {
    pub role: Role,
    parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, first: Part) -> Self {
        Self {
            role,
            parts: vec![first],
        }
    }

    /// Text turn, optionally followed by one media part in the same turn.
    pub fn with_media(role: Role, text: impl Into<String>, media: Option<Media>) -> Self {
        let mut turn = Self::new(role, Part::text(text));
        if let Some(media) = media {
            turn.push_part(media.into_part());
        }
        turn
    }

    pub fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// First text part, if any.
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TurnShape {
    role: Role,
    parts: Vec<Part>,
}

#[derive(Debug, Error)]
#[error("turn has no parts")]
pub struct EmptyTurn;

impl TryFrom<TurnShape> for Turn {
    type Error = EmptyTurn;

    fn try_from(shape: TurnShape) -> Result<Self, Self::Error> {
        if shape.parts.is_empty() {
            return Err(EmptyTurn);
        }
        Ok(Self {
            role: shape.role,
            parts: shape.parts,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Decoding parameters sent with every request for a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

/// Full multi-turn state for one conversation.
///
/// Serialises to the backend's request body, which is also the stored
/// payload format. Only `contents` changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversationRecord {
    contents: Vec<Turn>,
    system_instruction: Turn,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

impl ConversationRecord {
    pub fn new(
        system_instruction: Turn,
        safety_settings: Vec<SafetySetting>,
        generation_config: GenerationConfig,
    ) -> Self {
        Self {
            contents: Vec::new(),
            system_instruction,
            safety_settings,
            generation_config,
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.contents.push(turn);
    }

    pub fn contents(&self) -> &[Turn] {
        &self.contents
    }

    pub fn system_instruction(&self) -> &Turn {
        &self.system_instruction
    }

    pub fn safety_settings(&self) -> &[SafetySetting] {
        &self.safety_settings
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation_config
    }
}
