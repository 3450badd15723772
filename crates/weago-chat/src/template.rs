use weago_types::{
    ConversationRecord, GenerationConfig, HarmBlockThreshold, HarmCategory, Part, Role,
    SafetySetting, Turn,
};

/// Built-in persona used as every conversation's system instruction.
pub const DEFAULT_PERSONA: &str = "You are Aika, a friendly, empathetic and creative assistant \
who reads people's moods well. Reply in casual Indonesian and keep emojis to a minimum. Only \
respond when you are addressed by name or someone clearly wants to talk to you; otherwise reply \
with 'DISABLE_RESPONSE' and nothing else. Keep replies short, without extra blank lines, and use \
WhatsApp text formatting instead of markdown.";

/// The fixed fields stamped onto a conversation when it is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTemplate {
    pub persona: String,
    pub safety_settings: Vec<SafetySetting>,
    pub generation_config: GenerationConfig,
}

impl Default for RecordTemplate {
    fn default() -> Self {
        let permissive = |category| SafetySetting {
            category,
            threshold: HarmBlockThreshold::BlockNone,
        };

        Self {
            persona: DEFAULT_PERSONA.to_string(),
            safety_settings: vec![
                permissive(HarmCategory::Harassment),
                permissive(HarmCategory::HateSpeech),
                permissive(HarmCategory::SexuallyExplicit),
                permissive(HarmCategory::DangerousContent),
            ],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_k: 64,
                top_p: 0.5,
                max_output_tokens: 8192,
                response_mime_type: "text/plain".to_string(),
            },
        }
    }
}

impl RecordTemplate {
    pub fn with_persona(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            ..Self::default()
        }
    }

    /// Empty conversation carrying this template's fixed fields.
    pub fn new_record(&self) -> ConversationRecord {
        ConversationRecord::new(
            Turn::new(Role::User, Part::text(self.persona.clone())),
            self.safety_settings.clone(),
            self.generation_config.clone(),
        )
    }
}
