//! Main HTTP Gateway Server.
//!
//! Owns the shared state, the route table, and the listener loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use mdchat_config::{MdChatConfig, ProviderConfig, RenderConfig, StorageConfig, defaults};
use mdchat_core::{ChatStore, CompletionProvider, JsonFileChatStore, MemoryChatStore};
use mdchat_logging::{ChatEvent, ChatEventLogger, EventLogEntry};
use mdchat_markdown::{
    ContentOrigin, ParserStrategy, RenderOutcome, RenderPipeline, enhance_fragment,
};
use mdchat_providers::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, MockProvider, OpenAiCompatibleProvider,
    regional_base_url,
};

use crate::in_flight::InFlightChats;
use crate::{chat_api, chats_api, health_api, render_api};

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub provider: Arc<dyn CompletionProvider>,
    pub chats: Arc<dyn ChatStore>,
    pub pipeline: RenderPipeline,
    /// Apply the post-render enhancer to reply HTML.
    pub enhance: bool,
    pub in_flight: InFlightChats,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(provider: Arc<dyn CompletionProvider>, chats: Arc<dyn ChatStore>) -> Self {
        Self {
            provider,
            chats,
            pipeline: RenderPipeline::default(),
            enhance: true,
            in_flight: InFlightChats::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_rendering(mut self, strategy: ParserStrategy, enhance: bool) -> Self {
        self.pipeline = RenderPipeline::new(strategy);
        self.enhance = enhance;
        self
    }

    /// Builds provider, chat store and renderer from a prepared config.
    pub async fn from_config(config: &MdChatConfig) -> Result<Self> {
        let provider = build_provider(&config.provider())?;
        let chats = build_chat_store(&config.storage()).await?;
        let render = config.render();
        Ok(Self::new(provider, chats)
            .with_rendering(parser_strategy(&render), render.enhance.unwrap_or(true)))
    }

    /// Renders an assistant reply for the HTTP response.
    pub(crate) fn render_reply(&self, label: &str, text: &str) -> String {
        let outcome = self.pipeline.render_detailed(text, ContentOrigin::Assistant);
        self.present_reply(label, outcome)
    }

    fn present_reply(&self, label: &str, outcome: RenderOutcome) -> String {
        log_render_fallback(label, &outcome);
        if self.enhance && !outcome.html.is_empty() {
            enhance_fragment(&outcome.html, &outcome.code_languages)
        } else {
            outcome.html
        }
    }
}

/// Emits a `RenderFallback` chat event when the full engine failed.
fn log_render_fallback(label: &str, outcome: &RenderOutcome) -> Option<EventLogEntry> {
    outcome.used_fallback.then(|| {
        ChatEventLogger::log_event(
            label,
            ChatEvent::RenderFallback {
                reason: "full parser failed on reply".into(),
            },
        )
    })
}

/// The parser named by `render.parser`; anything but "fallback" is full.
pub fn parser_strategy(config: &RenderConfig) -> ParserStrategy {
    match config.parser.as_deref() {
        Some("fallback") => ParserStrategy::Fallback,
        _ => ParserStrategy::Full,
    }
}

/// Creates the completion provider named by `config.kind`.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.kind.as_deref().unwrap_or(defaults::DEFAULT_PROVIDER_KIND) {
        "mock" => Ok(Arc::new(MockProvider::new("mock"))),
        "openai" => {
            let base_url = config.base_url.clone().unwrap_or_else(|| {
                regional_base_url(config.region.as_deref().unwrap_or(defaults::DEFAULT_REGION))
            });
            let provider = OpenAiCompatibleProvider::new(base_url)
                .with_api_key(config.api_key.clone())
                .with_model(config.model.as_deref().unwrap_or(DEFAULT_MODEL))
                .with_limits(
                    config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                    config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                )
                .with_system_prompt(config.system_prompt.clone());
            info!(model = provider.model(), "Using OpenAI-compatible provider");
            Ok(Arc::new(provider))
        }
        other => bail!("Unknown provider kind '{other}'"),
    }
}

/// Opens the chat store named by `config.backend`.
pub async fn build_chat_store(config: &StorageConfig) -> Result<Arc<dyn ChatStore>> {
    match config
        .backend
        .as_deref()
        .unwrap_or(defaults::DEFAULT_STORAGE_BACKEND)
    {
        "memory" => Ok(Arc::new(MemoryChatStore::new())),
        "json" => {
            let Some(dir) = config.chats_dir.as_deref() else {
                bail!("storage.chatsDir is required for the json backend");
            };
            let store = JsonFileChatStore::open(dir)
                .await
                .with_context(|| format!("Failed to open chat store at {dir}"))?;
            info!(dir, "Using JSON chat store");
            Ok(Arc::new(store))
        }
        other => bail!("Unknown storage backend '{other}'"),
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(health_api::get_health))
        .route("/api/chat", post(chat_api::chat))
        .route("/api/chat/stream", post(chat_api::chat_stream))
        .route("/api/render", post(render_api::render))
        .route(
            "/api/chats",
            get(chats_api::list_chats).post(chats_api::create_chat),
        )
        .route(
            "/api/chats/{id}",
            get(chats_api::get_chat)
                .put(chats_api::update_chat)
                .delete(chats_api::delete_chat),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the main Axum HTTP server for the gateway.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Gateway HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
