use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};
use weago_db::{Database, StoreError};
use weago_types::events::{InboundEvent, InboundMedia, MediaKind};
use weago_types::{ConversationRecord, Media, Role, SettingsRecord};

use crate::service::ConversationService;

/// Reply the model sends when it decides to stay quiet.
pub const SILENT_REPLY: &str = "DISABLE_RESPONSE";

const PONG: &str = "pong!";
const ENABLED_NOTICE: &str = "> Assistant enabled for this chat.";
const DISABLED_NOTICE: &str = "> Assistant disabled for this chat.";
const SETTINGS_UNAVAILABLE: &str = "> Settings are unavailable right now, try again later.";
const HISTORY_UNAVAILABLE: &str = "> Chat history is unavailable right now, try again later.";
const BACKEND_FAILED: &str = "> The assistant could not answer, try again later.";

/// The generative backend. Implemented by the HTTP client outside this crate.
pub trait AiBackend: Send + Sync {
    /// Produce the next model reply for the whole conversation.
    fn generate(
        &self,
        request: &ConversationRecord,
    ) -> impl Future<Output = anyhow::Result<String>> + Send;

    /// Upload a video and return the URI the backend will accept in a
    /// file reference.
    fn upload_video(&self, bytes: Vec<u8>) -> impl Future<Output = anyhow::Result<String>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Nothing to send back.
    Silent,
    Text(String),
}

/// Turns inbound messages into conversation turns and replies.
pub struct MessageHandler<B> {
    service: Arc<ConversationService>,
    settings: Arc<Database>,
    backend: B,
    /// Longest message text, in characters, that is recorded and answered.
    max_turn_chars: usize,
}

impl<B: AiBackend> MessageHandler<B> {
    pub fn new(
        service: Arc<ConversationService>,
        settings: Arc<Database>,
        backend: B,
        max_turn_chars: usize,
    ) -> Self {
        Self {
            service,
            settings,
            backend,
            max_turn_chars,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let id = event.conversation_id();

        match event.text.trim() {
            "ping" => return Reply::Text(PONG.to_string()),
            "use-ai" => return self.switch_assistant(&event, true).await,
            "disable-ai" => return self.switch_assistant(&event, false).await,
            _ => {}
        }

        if !self.assistant_enabled(&id).await {
            return Reply::Silent;
        }

        let length = event.text.chars().count();
        if length > self.max_turn_chars {
            debug!(jid = %id, length, "Message over the text budget");
            return Reply::Text(format!(
                "> Message too long ({} characters, limit {}).",
                length, self.max_turn_chars
            ));
        }

        let media = match event.media {
            None => None,
            Some(InboundMedia { kind: MediaKind::Image, bytes }) => Some(Media::Image(bytes)),
            Some(InboundMedia { kind: MediaKind::Video, bytes }) => {
                match self.backend.upload_video(bytes).await {
                    Ok(uri) => Some(Media::Video { uri }),
                    Err(e) => {
                        warn!(jid = %id, "Video upload failed: {:#}", e);
                        return Reply::Text(BACKEND_FAILED.to_string());
                    }
                }
            }
        };

        let content = format!("{}: {}", event.sender_name, event.text);
        let request = match self.record_user_turn(&id, content, media).await {
            Ok(Some(record)) => record,
            Ok(None) => return Reply::Silent,
            Err(e) => {
                warn!(jid = %id, "Could not load conversation: {:#}", e);
                return Reply::Text(HISTORY_UNAVAILABLE.to_string());
            }
        };

        let reply = match self.backend.generate(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(jid = %id, "Backend request failed: {:#}", e);
                return Reply::Text(BACKEND_FAILED.to_string());
            }
        };

        if reply.trim().eq_ignore_ascii_case(SILENT_REPLY) {
            debug!(jid = %id, "Model chose not to answer");
            return Reply::Silent;
        }

        self.record_model_turn(&id, reply.clone()).await;
        Reply::Text(reply)
    }

    /// Load history, append the user turn and return the request snapshot.
    async fn record_user_turn(
        &self,
        id: &str,
        content: String,
        media: Option<Media>,
    ) -> anyhow::Result<Option<ConversationRecord>> {
        let service = self.service.clone();
        let id = id.to_string();
        let record = tokio::task::spawn_blocking(move || {
            service.get_or_load(&id)?;
            service.add_turn(&id, Role::User, content, media);
            Ok::<_, StoreError>(service.snapshot(&id))
        })
        .await??;
        Ok(record)
    }

    /// Append the reply and save synchronously. A failed save only costs
    /// durability; the write-back loop retries it.
    async fn record_model_turn(&self, id: &str, reply: String) {
        let service = self.service.clone();
        let owned_id = id.to_string();
        let saved = tokio::task::spawn_blocking(move || {
            service.add_turn(&owned_id, Role::Model, reply, None);
            service.save(&owned_id)
        })
        .await;

        match saved {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(jid = %id, "Failed to persist conversation: {}", e),
            Err(e) => warn!(jid = %id, "Persist task failed: {}", e),
        }
    }

    async fn assistant_enabled(&self, id: &str) -> bool {
        let settings = self.settings.clone();
        let owned_id = id.to_string();
        let result = tokio::task::spawn_blocking(move || settings.get_settings(&owned_id)).await;

        match result {
            Ok(Ok(record)) => record.use_ai,
            Ok(Err(e)) if e.is_not_found() => false,
            Ok(Err(e)) => {
                warn!(jid = %id, "Settings lookup failed: {}", e);
                false
            }
            Err(e) => {
                warn!(jid = %id, "Settings task failed: {}", e);
                false
            }
        }
    }

    async fn switch_assistant(&self, event: &InboundEvent, enabled: bool) -> Reply {
        let id = event.conversation_id();
        let settings = self.settings.clone();
        let defaults = SettingsRecord {
            use_ai: enabled,
            ..SettingsRecord::for_chat(&event.chat, event.chat_owner.as_ref(), &event.chat_name)
        };
        let owned_id = id.clone();

        let result = tokio::task::spawn_blocking(move || match settings.set_use_ai(&owned_id, enabled) {
            Err(e) if e.is_not_found() => settings.upsert_settings(&owned_id, &defaults),
            other => other,
        })
        .await;

        match result {
            Ok(Ok(())) => {
                info!(jid = %id, enabled, "Assistant switched by {}", event.sender);
                let notice = if enabled { ENABLED_NOTICE } else { DISABLED_NOTICE };
                Reply::Text(notice.to_string())
            }
            Ok(Err(e)) => {
                warn!(jid = %id, "Could not store settings: {}", e);
                Reply::Text(SETTINGS_UNAVAILABLE.to_string())
            }
            Err(e) => {
                warn!(jid = %id, "Settings task failed: {}", e);
                Reply::Text(SETTINGS_UNAVAILABLE.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::RecordTemplate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use weago_types::{Jid, Part};

    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<anyhow::Result<String>>>,
        requests: Mutex<Vec<ConversationRecord>>,
    }

    impl ScriptedBackend {
        fn replying(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl AiBackend for ScriptedBackend {
        async fn generate(&self, request: &ConversationRecord) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()))
        }

        async fn upload_video(&self, bytes: Vec<u8>) -> anyhow::Result<String> {
            Ok(format!("files/video-{}", bytes.len()))
        }
    }

    struct Fixture {
        chats: Arc<Database>,
        settings: Arc<Database>,
        handler: MessageHandler<ScriptedBackend>,
    }

    fn fixture(backend: ScriptedBackend) -> Fixture {
        let chats = Arc::new(Database::open_in_memory().unwrap());
        let settings = Arc::new(Database::open_in_memory().unwrap());
        let service = Arc::new(ConversationService::new(chats.clone(), RecordTemplate::default()));
        let handler = MessageHandler::new(service, settings.clone(), backend, 100);
        Fixture {
            chats,
            settings,
            handler,
        }
    }

    fn event(text: &str) -> InboundEvent {
        InboundEvent {
            chat: "62811@g.us".parse::<Jid>().unwrap(),
            chat_name: "Family".into(),
            chat_owner: Some("62800@s.whatsapp.net".parse().unwrap()),
            sender: "62822@s.whatsapp.net".parse().unwrap(),
            sender_name: "Budi".into(),
            text: text.into(),
            media: None,
            received_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn ping_answers_without_settings() {
        let fx = fixture(ScriptedBackend::default());
        assert_eq!(fx.handler.handle(event("ping")).await, Reply::Text(PONG.into()));
    }

    #[tokio::test]
    async fn silent_until_enabled() {
        let fx = fixture(ScriptedBackend::default());
        assert_eq!(fx.handler.handle(event("hello")).await, Reply::Silent);
        assert!(fx.handler.backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn use_ai_creates_settings_and_disable_flips_them() {
        let fx = fixture(ScriptedBackend::default());

        let reply = fx.handler.handle(event("use-ai")).await;
        assert_eq!(reply, Reply::Text(ENABLED_NOTICE.into()));
        let stored = fx.settings.get_settings("62811@g.us").unwrap();
        assert!(stored.use_ai);
        assert_eq!(stored.name, "Family");

        fx.handler.handle(event("disable-ai")).await;
        assert!(!fx.settings.get_settings("62811@g.us").unwrap().use_ai);
    }

    #[tokio::test]
    async fn reply_is_recorded_and_saved() {
        let fx = fixture(ScriptedBackend::replying(vec![Ok("halo Budi".into())]));
        fx.handler.handle(event("use-ai")).await;

        let reply = fx.handler.handle(event("hi Aika")).await;
        assert_eq!(reply, Reply::Text("halo Budi".into()));

        let stored = fx.chats.load_conversation("62811@g.us").unwrap().unwrap();
        let texts: Vec<_> = stored.contents().iter().map(|t| t.text().unwrap()).collect();
        assert_eq!(texts, vec!["Budi: hi Aika", "halo Budi"]);
        assert_eq!(stored.contents()[1].role, Role::Model);

        let requests = fx.handler.backend.requests.lock().unwrap();
        assert_eq!(requests[0].contents().len(), 1);
    }

    #[tokio::test]
    async fn silent_reply_is_not_recorded() {
        let fx = fixture(ScriptedBackend::replying(vec![Ok(" disable_response \n".into())]));
        fx.handler.handle(event("use-ai")).await;

        assert_eq!(fx.handler.handle(event("talking to someone else")).await, Reply::Silent);
        let record = fx.handler.service.snapshot("62811@g.us").unwrap();
        assert_eq!(record.contents().len(), 1);
        assert_eq!(record.contents()[0].role, Role::User);
    }

    #[tokio::test]
    async fn long_text_is_rejected_before_recording() {
        let fx = fixture(ScriptedBackend::default());
        fx.handler.handle(event("use-ai")).await;

        let reply = fx.handler.handle(event(&"x".repeat(101))).await;
        assert!(matches!(reply, Reply::Text(ref t) if t.contains("too long")));
        assert!(fx.handler.service.snapshot("62811@g.us").is_none());
    }

    #[tokio::test]
    async fn backend_failure_keeps_the_user_turn() {
        let fx = fixture(ScriptedBackend::replying(vec![Err(anyhow::anyhow!("503"))]));
        fx.handler.handle(event("use-ai")).await;

        let reply = fx.handler.handle(event("hi")).await;
        assert_eq!(reply, Reply::Text(BACKEND_FAILED.into()));
        assert_eq!(fx.handler.service.snapshot("62811@g.us").unwrap().contents().len(), 1);
    }

    #[tokio::test]
    async fn media_rides_in_the_user_turn() {
        let fx = fixture(ScriptedBackend::default());
        fx.handler.handle(event("use-ai")).await;

        let mut with_image = event("what is this");
        with_image.media = Some(InboundMedia {
            kind: MediaKind::Image,
            bytes: vec![1, 2, 3],
        });
        fx.handler.handle(with_image).await;

        let mut with_video = event("and this");
        with_video.media = Some(InboundMedia {
            kind: MediaKind::Video,
            bytes: vec![0; 7],
        });
        fx.handler.handle(with_video).await;

        let record = fx.handler.service.snapshot("62811@g.us").unwrap();
        let turns = record.contents();
        assert_eq!(turns.len(), 4);
        assert!(matches!(turns[0].parts()[1], Part::InlineImage(_)));
        assert_eq!(
            turns[2].parts()[1],
            Part::file_reference("video/mp4", "files/video-7")
        );
    }
}
