//! Remote chat store.
//!
//! `ChatStore` is the persistence port behind the gateway's chat CRUD API.
//! Two implementations: an in-memory map and a directory of JSON files,
//! one file per chat.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ChatError;
use crate::message::{ChatMessage, ChatRecord, ChatSummary};

/// Partial update for a chat record. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatUpdate {
    pub title: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Summaries of every chat, most recently updated first.
    async fn list(&self) -> Result<Vec<ChatSummary>, ChatError>;

    async fn create(&self, title: Option<String>) -> Result<ChatRecord, ChatError>;

    async fn get(&self, id: Uuid) -> Result<Option<ChatRecord>, ChatError>;

    async fn update(&self, id: Uuid, update: ChatUpdate) -> Result<ChatRecord, ChatError>;

    /// Returns false when no such chat existed.
    async fn delete(&self, id: Uuid) -> Result<bool, ChatError>;

    /// Appends messages in order and returns the updated record.
    async fn append(&self, id: Uuid, messages: Vec<ChatMessage>) -> Result<ChatRecord, ChatError>;
}

fn apply_update(record: &mut ChatRecord, update: ChatUpdate) {
    if let Some(title) = update.title.map(|t| t.trim().to_string()) {
        if !title.is_empty() {
            record.title = title;
        }
    }
    if let Some(messages) = update.messages {
        record.messages = messages;
    }
    record.touch();
}

fn newest_first(mut summaries: Vec<ChatSummary>) -> Vec<ChatSummary> {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryChatStore {
    chats: RwLock<HashMap<Uuid, ChatRecord>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn list(&self) -> Result<Vec<ChatSummary>, ChatError> {
        let chats = self.chats.read().await;
        Ok(newest_first(chats.values().map(ChatRecord::summary).collect()))
    }

    async fn create(&self, title: Option<String>) -> Result<ChatRecord, ChatError> {
        let record = ChatRecord::new(title);
        self.chats.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatRecord>, ChatError> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: ChatUpdate) -> Result<ChatRecord, ChatError> {
        let mut chats = self.chats.write().await;
        let record = chats.get_mut(&id).ok_or(ChatError::ChatNotFound(id))?;
        apply_update(record, update);
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ChatError> {
        Ok(self.chats.write().await.remove(&id).is_some())
    }

    async fn append(&self, id: Uuid, messages: Vec<ChatMessage>) -> Result<ChatRecord, ChatError> {
        let mut chats = self.chats.write().await;
        let record = chats.get_mut(&id).ok_or(ChatError::ChatNotFound(id))?;
        for message in messages {
            record.push(message);
        }
        Ok(record.clone())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Stores each chat as `<dir>/<id>.json`. Writes go through a temp file and
/// a rename so a crash never leaves a half-written record.
#[derive(Debug)]
pub struct JsonFileChatStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileChatStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("[ChatStore] Using chat directory {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read(&self, id: Uuid) -> Result<Option<ChatRecord>, ChatError> {
        match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, record: &ChatRecord) -> Result<(), ChatError> {
        let path = self.path_for(record.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(chat_id = %record.id, "[ChatStore] Wrote {}", path.display());
        Ok(())
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> Result<ChatRecord, ChatError>
    where
        F: FnOnce(&mut ChatRecord) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read(id).await?.ok_or(ChatError::ChatNotFound(id))?;
        change(&mut record);
        self.write(&record).await?;
        Ok(record)
    }
}

#[async_trait]
impl ChatStore for JsonFileChatStore {
    async fn list(&self) -> Result<Vec<ChatSummary>, ChatError> {
        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<ChatRecord>(&raw) {
                Ok(record) => summaries.push(record.summary()),
                Err(err) => warn!("[ChatStore] Skipping unreadable {}: {}", path.display(), err),
            }
        }
        Ok(newest_first(summaries))
    }

    async fn create(&self, title: Option<String>) -> Result<ChatRecord, ChatError> {
        let record = ChatRecord::new(title);
        let _guard = self.write_lock.lock().await;
        self.write(&record).await?;
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ChatRecord>, ChatError> {
        self.read(id).await
    }

    async fn update(&self, id: Uuid, update: ChatUpdate) -> Result<ChatRecord, ChatError> {
        self.modify(id, |record| apply_update(record, update)).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ChatError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn append(&self, id: Uuid, messages: Vec<ChatMessage>) -> Result<ChatRecord, ChatError> {
        self.modify(id, |record| {
            for message in messages {
                record.push(message);
            }
        })
        .await
    }
}
