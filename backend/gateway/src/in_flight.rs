//! Per-chat submission guard.
//!
//! A chat may have at most one completion running. The permit returned by
//! [`InFlightChats::try_acquire`] releases the chat when dropped, including
//! when a streaming task ends early.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InFlightChats {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightChats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `chat_id`, or returns `None` while another submission holds it.
    pub fn try_acquire(&self, chat_id: Uuid) -> Option<InFlightPermit> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(chat_id) {
            warn!(%chat_id, "Submission refused, chat busy");
            return None;
        }
        debug!(%chat_id, "Submission started");
        Some(InFlightPermit {
            chat_id,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_busy(&self, chat_id: Uuid) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id)
    }
}

#[derive(Debug)]
pub struct InFlightPermit {
    chat_id: Uuid,
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightPermit {
    pub fn chat_id(&self) -> Uuid {
        self.chat_id
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.chat_id);
        debug!(chat_id = %self.chat_id, "Submission finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_submission_is_refused_until_release() {
        let chats = InFlightChats::new();
        let id = Uuid::new_v4();

        let permit = chats.try_acquire(id).unwrap();
        assert!(chats.is_busy(id));
        assert!(chats.try_acquire(id).is_none());

        drop(permit);
        assert!(!chats.is_busy(id));
        assert!(chats.try_acquire(id).is_some());
    }

    #[test]
    fn chats_are_independent() {
        let chats = InFlightChats::new();
        let _a = chats.try_acquire(Uuid::new_v4()).unwrap();
        assert!(chats.try_acquire(Uuid::new_v4()).is_some());
    }
}
