pub mod cache;
pub mod handler;
pub mod service;
pub mod template;
pub mod writeback;

pub use cache::ConversationCache;
pub use handler::{AiBackend, MessageHandler, Reply};
pub use service::{ConversationService, FlushReport};
pub use template::RecordTemplate;
pub use writeback::{WriteBack, run_write_back_loop};
