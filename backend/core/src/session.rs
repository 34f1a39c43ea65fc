//! Client session state.
//!
//! Everything a chat client remembers between runs lives in one explicit
//! `SessionState` value, loaded from and saved to a `SessionStore`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChatError;
use crate::message::{ChatMessage, ChatRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_chat: Option<Uuid>,
    #[serde(default)]
    pub chats: Vec<ChatRecord>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub sidebar_collapsed: bool,
    /// Runtime only; a restored session never starts mid-submission.
    #[serde(skip)]
    pub submitting: bool,
}

impl SessionState {
    /// Starts a new chat and makes it current.
    pub fn new_chat(&mut self, title: Option<String>) -> Uuid {
        let record = ChatRecord::new(title);
        let id = record.id;
        self.chats.push(record);
        self.current_chat = Some(id);
        id
    }

    pub fn chat(&self, id: Uuid) -> Option<&ChatRecord> {
        self.chats.iter().find(|c| c.id == id)
    }

    pub fn current(&self) -> Option<&ChatRecord> {
        self.current_chat.and_then(|id| self.chat(id))
    }

    /// The current chat, creating one if there is none.
    pub fn current_mut(&mut self) -> &mut ChatRecord {
        let id = match self.current_chat.filter(|id| self.chats.iter().any(|c| c.id == *id)) {
            Some(id) => id,
            None => self.new_chat(None),
        };
        let index = self.chats.iter().position(|c| c.id == id).unwrap_or(0);
        &mut self.chats[index]
    }

    pub fn select(&mut self, id: Uuid) -> Result<(), ChatError> {
        if self.chat(id).is_none() {
            return Err(ChatError::ChatNotFound(id));
        }
        self.current_chat = Some(id);
        Ok(())
    }

    /// Removes a chat; if it was current, the most recently updated
    /// remaining chat becomes current.
    pub fn delete_chat(&mut self, id: Uuid) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != id);
        if self.current_chat == Some(id) {
            self.current_chat = self
                .chats
                .iter()
                .max_by_key(|c| c.updated_at)
                .map(|c| c.id);
        }
        self.chats.len() != before
    }

    /// Marks a submission as in flight. Fails if one already is.
    pub fn begin_submit(&mut self) -> Result<(), ChatError> {
        if self.submitting {
            return Err(ChatError::SubmitInProgress);
        }
        self.submitting = true;
        Ok(())
    }

    /// Clears the in-flight flag and records the exchange on success.
    pub fn finish_submit(&mut self, exchange: Option<(ChatMessage, ChatMessage)>) {
        self.submitting = false;
        if let Some((user, assistant)) = exchange {
            let chat = self.current_mut();
            chat.push(user);
            chat.push(assistant);
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        self.sidebar_collapsed
    }
}

/// Persistence port for `SessionState`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the saved state, or the default state if nothing is saved.
    async fn load(&self) -> Result<SessionState, ChatError>;

    async fn save(&self, state: &SessionState) -> Result<(), ChatError>;
}

/// Session state kept as a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn load(&self) -> Result<SessionState, ChatError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("[Session] No session file at {}", self.path.display());
                Ok(SessionState::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, state: &SessionState) -> Result<(), ChatError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(state)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<SessionState>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<SessionState, ChatError> {
        Ok(self.state.lock().await.clone().unwrap_or_default())
    }

    async fn save(&self, state: &SessionState) -> Result<(), ChatError> {
        *self.state.lock().await = Some(state.clone());
        Ok(())
    }
}
