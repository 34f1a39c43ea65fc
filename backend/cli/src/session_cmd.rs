//! `mdchat history` and `mdchat theme`: the locally persisted session.

use anyhow::{bail, Result};
use uuid::Uuid;

use mdchat_core::{SessionState, SessionStore, Theme};

use crate::output::{chat_table, note_info, note_success, transcript};

#[derive(Debug, Default)]
pub struct HistoryOptions {
    /// Print the current chat instead of the chat list.
    pub show: bool,
    pub select: Option<Uuid>,
    pub delete: Option<Uuid>,
}

/// Applies any selection or deletion, then prints the chat list or the
/// current transcript. Returns the text that was printed.
pub async fn history(store: &dyn SessionStore, options: &HistoryOptions) -> Result<String> {
    let mut session = store.load().await?;
    let changed = apply(&mut session, options)?;
    if changed {
        store.save(&session).await?;
    }

    let text = if options.show {
        match session.current() {
            Some(chat) => transcript(chat),
            None => String::new(),
        }
    } else if session.chats.is_empty() {
        String::new()
    } else {
        chat_table(&session)
    };

    if text.is_empty() {
        note_info("No chats yet. Start one with `mdchat chat <message>`.");
    } else {
        print!("{text}");
    }
    Ok(text)
}

fn apply(session: &mut SessionState, options: &HistoryOptions) -> Result<bool> {
    let mut changed = false;
    if let Some(id) = options.delete {
        if !session.delete_chat(id) {
            bail!("No chat with id {id}");
        }
        note_success(&format!("Deleted chat {id}"));
        changed = true;
    }
    if let Some(id) = options.select {
        session.select(id)?;
        note_success(&format!("Switched to chat {id}"));
        changed = true;
    }
    Ok(changed)
}

pub async fn toggle_theme(store: &dyn SessionStore) -> Result<Theme> {
    let mut session = store.load().await?;
    let theme = session.toggle_theme();
    store.save(&session).await?;
    let name = match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    note_success(&format!("Theme is now {name}"));
    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdchat_core::{ChatMessage, MemorySessionStore};

    async fn store_with_two_chats() -> (MemorySessionStore, Uuid, Uuid) {
        let store = MemorySessionStore::default();
        let mut session = SessionState::default();
        let first = session.new_chat(Some("first".into()));
        session.finish_submit(Some((ChatMessage::user("q"), ChatMessage::assistant("a"))));
        let second = session.new_chat(Some("second".into()));
        store.save(&session).await.unwrap();
        (store, first, second)
    }

    #[tokio::test]
    async fn lists_chats() {
        let (store, first, second) = store_with_two_chats().await;
        let text = history(&store, &HistoryOptions::default()).await.unwrap();
        assert!(text.contains(&first.to_string()));
        assert!(text.contains(&second.to_string()));
    }

    #[tokio::test]
    async fn select_then_show_prints_that_transcript() {
        let (store, first, _) = store_with_two_chats().await;
        let options = HistoryOptions {
            show: true,
            select: Some(first),
            ..Default::default()
        };
        let text = history(&store, &options).await.unwrap();
        assert!(text.contains("first"));
        assert!(text.contains(": a"));
        assert_eq!(store.load().await.unwrap().current_chat, Some(first));
    }

    #[tokio::test]
    async fn deleting_current_chat_moves_selection() {
        let (store, first, second) = store_with_two_chats().await;
        let options = HistoryOptions {
            delete: Some(second),
            ..Default::default()
        };
        history(&store, &options).await.unwrap();

        let session = store.load().await.unwrap();
        assert_eq!(session.chats.len(), 1);
        assert_eq!(session.current_chat, Some(first));
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let (store, _, _) = store_with_two_chats().await;
        let missing = Uuid::new_v4();
        for options in [
            HistoryOptions {
                delete: Some(missing),
                ..Default::default()
            },
            HistoryOptions {
                select: Some(missing),
                ..Default::default()
            },
        ] {
            assert!(history(&store, &options).await.is_err());
        }
    }

    #[tokio::test]
    async fn theme_toggle_is_persisted() {
        let store = MemorySessionStore::default();
        assert_eq!(toggle_theme(&store).await.unwrap(), Theme::Dark);
        assert_eq!(store.load().await.unwrap().theme, Theme::Dark);
        assert_eq!(toggle_theme(&store).await.unwrap(), Theme::Light);
    }
}
