pub mod error;
pub mod message;
pub mod session;
pub mod store;
pub mod traits;

pub use error::ChatError;
pub use message::{
    last_user_message, ChatMessage, ChatRecord, ChatSummary, Role, DEFAULT_CHAT_TITLE,
};
pub use session::{JsonSessionStore, MemorySessionStore, SessionState, SessionStore, Theme};
pub use store::{ChatStore, ChatUpdate, JsonFileChatStore, MemoryChatStore};
pub use traits::{CompletionProvider, CompletionRequest, CompletionResponse};
