//! mdchat Gateway HTTP API Server
//!
//! Provides the completion and streaming endpoints, server-side Markdown
//! rendering, and the remote chat store.

pub mod chat_api;
pub mod chats_api;
pub mod error;
pub mod health_api;
pub mod in_flight;
pub mod render_api;
pub mod server;

pub use error::ApiError;
pub use in_flight::{InFlightChats, InFlightPermit};
pub use server::{
    build_chat_store, build_provider, build_router, parser_strategy, start_server, GatewayState,
};
