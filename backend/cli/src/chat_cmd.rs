//! `mdchat chat`: one exchange in the current chat of the local session.
//!
//! The reply comes either straight from the configured provider or from a
//! running gateway. Ctrl-C during a streamed reply keeps what has arrived.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mdchat_core::{
    ChatMessage, CompletionProvider, CompletionRequest, JsonSessionStore, SessionState,
    SessionStore,
};
use mdchat_markdown::{ContentOrigin, RenderPipeline};

use crate::client::GatewayClient;
use crate::output::{note_warn, stream_write};

/// Where replies come from.
pub enum ReplySource {
    Provider(Arc<dyn CompletionProvider>),
    Gateway(GatewayClient),
}

pub struct ChatOptions {
    pub stream: bool,
    /// Print rendered HTML instead of the raw reply text.
    pub html: bool,
    pub max_tokens: Option<u32>,
}

pub async fn run(
    store: &JsonSessionStore,
    source: &ReplySource,
    pipeline: RenderPipeline,
    message: String,
    new_chat: bool,
    options: &ChatOptions,
) -> Result<()> {
    let mut session = store.load().await?;
    if new_chat {
        let id = session.new_chat(None);
        info!(chat_id = %id, "Started a new chat");
    }

    let outcome = submit(&mut session, source, pipeline, message, options).await;
    store.save(&session).await?;
    outcome.map(|_| ())
}

/// Sends `message` with the current chat as context and records the
/// exchange. Returns the reply text; an empty reply records nothing.
pub async fn submit(
    session: &mut SessionState,
    source: &ReplySource,
    pipeline: RenderPipeline,
    message: String,
    options: &ChatOptions,
) -> Result<String> {
    session.begin_submit()?;

    let user = ChatMessage::user(message);
    let mut messages = session.current_mut().messages.clone();
    messages.push(user.clone());

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let reply = fetch_reply(source, pipeline, messages, options, &cancel).await;
    ctrl_c.abort();

    match reply {
        Ok(text) if text.trim().is_empty() => {
            session.finish_submit(None);
            note_warn("No reply received");
            Ok(text)
        }
        Ok(text) => {
            if cancel.is_cancelled() {
                note_warn("Reply interrupted; keeping the partial text");
            }
            session.finish_submit(Some((user, ChatMessage::assistant(text.clone()))));
            Ok(text)
        }
        Err(e) => {
            session.finish_submit(None);
            Err(e)
        }
    }
}

async fn fetch_reply(
    source: &ReplySource,
    pipeline: RenderPipeline,
    messages: Vec<ChatMessage>,
    options: &ChatOptions,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut stdout = io::stdout();
    match (source, options.stream) {
        (ReplySource::Provider(provider), false) => {
            let request = CompletionRequest::new(messages).with_max_tokens(options.max_tokens);
            let response = provider.complete(&request).await?;
            debug!(latency_ms = response.latency_ms, model = %response.model, "Reply received");
            print_reply(&response.text, || {
                pipeline.render_enhanced(&response.text, ContentOrigin::Assistant)
            }, options.html);
            Ok(response.text)
        }
        (ReplySource::Provider(provider), true) => {
            let request = CompletionRequest::new(messages).with_max_tokens(options.max_tokens);
            let (tx, mut rx) = mpsc::channel::<String>(32);
            let printer = async {
                while let Some(chunk) = rx.recv().await {
                    let _ = stream_write(&mut stdout, &chunk);
                }
            };
            let (text, ()) = tokio::join!(provider.stream(&request, tx, cancel.clone()), printer);
            println!();
            text
        }
        (ReplySource::Gateway(client), false) => {
            let reply = client.complete(&messages, options.max_tokens).await?;
            print_reply(&reply.text, || reply.html.clone(), options.html);
            Ok(reply.text)
        }
        (ReplySource::Gateway(client), true) => {
            let reply = client
                .stream(&messages, options.max_tokens, cancel, |chunk| {
                    let _ = stream_write(&mut stdout, chunk);
                })
                .await?;
            println!();
            if !reply.finished && !cancel.is_cancelled() {
                note_warn("Gateway stream ended without an end marker");
            }
            Ok(reply.text)
        }
    }
}

fn print_reply(text: &str, html: impl FnOnce() -> String, as_html: bool) {
    if as_html {
        println!("{}", html());
    } else {
        println!("{}", text.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdchat_core::Role;
    use mdchat_providers::MockProvider;

    fn options(stream: bool) -> ChatOptions {
        ChatOptions {
            stream,
            html: false,
            max_tokens: None,
        }
    }

    fn provider(mock: MockProvider) -> ReplySource {
        ReplySource::Provider(Arc::new(mock))
    }

    #[tokio::test]
    async fn exchange_is_recorded_in_the_current_chat() {
        let mut session = SessionState::default();
        let source = provider(MockProvider::new("mock").with_response("Hello!"));

        let text = submit(
            &mut session,
            &source,
            RenderPipeline::default(),
            "Hi there".into(),
            &options(false),
        )
        .await
        .unwrap();

        assert_eq!(text, "Hello!");
        assert!(!session.submitting);
        let chat = session.current().unwrap();
        assert_eq!(chat.title, "Hi there");
        assert_eq!(
            chat.messages,
            vec![ChatMessage::user("Hi there"), ChatMessage::assistant("Hello!")]
        );
    }

    #[tokio::test]
    async fn previous_turns_are_sent_as_context() {
        let mock = Arc::new(MockProvider::new("mock").with_chunks(["a", "b"]));
        let source = ReplySource::Provider(mock.clone());
        let mut session = SessionState::default();

        for (question, stream) in [("one", false), ("two", true)] {
            submit(
                &mut session,
                &source,
                RenderPipeline::default(),
                question.into(),
                &options(stream),
            )
            .await
            .unwrap();
        }

        let second = &mock.requests()[1];
        let roles: Vec<Role> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(session.current().unwrap().messages.len(), 4);
        assert_eq!(session.current().unwrap().messages[3].content, "ab");
    }

    #[tokio::test]
    async fn failed_reply_leaves_the_chat_untouched() {
        let mut session = SessionState::default();
        let source = provider(MockProvider::new("mock").failing("quota exceeded"));

        let err = submit(
            &mut session,
            &source,
            RenderPipeline::default(),
            "q".into(),
            &options(false),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
        assert!(!session.submitting);
        assert!(session.current().unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn overlapping_submission_is_refused() {
        let mut session = SessionState::default();
        session.begin_submit().unwrap();
        let source = provider(MockProvider::new("mock"));

        let err = submit(
            &mut session,
            &source,
            RenderPipeline::default(),
            "q".into(),
            &options(false),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("already in progress"));
    }

    #[tokio::test]
    async fn run_persists_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(dir.path().join("session.json"));
        let source = provider(MockProvider::new("mock").with_response("pong"));

        for new_chat in [false, true] {
            run(
                &store,
                &source,
                RenderPipeline::default(),
                "ping".into(),
                new_chat,
                &options(false),
            )
            .await
            .unwrap();
        }

        let session = store.load().await.unwrap();
        assert_eq!(session.chats.len(), 2);
        assert_eq!(session.current().unwrap().messages.len(), 2);
    }
}
