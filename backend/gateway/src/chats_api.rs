//! Remote chat store endpoints (`/api/chats`).

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use mdchat_core::{ChatError, ChatRecord, ChatUpdate};

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateChat {
    #[serde(default)]
    pub title: Option<String>,
}

/// Handler for `GET /api/chats`. Newest first.
pub async fn list_chats(State(state): State<GatewayState>) -> Result<Json<Value>, ApiError> {
    let chats = state.chats.list().await?;
    Ok(Json(json!({ "chats": chats })))
}

/// Handler for `POST /api/chats`. The body is optional.
pub async fn create_chat(
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ChatRecord>), ApiError> {
    let request: CreateChat = if body.iter().all(u8::is_ascii_whitespace) {
        CreateChat::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid chat body: {e}")))?
    };

    let record = state.chats.create(request.title).await?;
    info!(chat_id = %record.id, title = %record.title, "Chat created");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Handler for `GET /api/chats/{id}`.
pub async fn get_chat(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatRecord>, ApiError> {
    match state.chats.get(id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ChatError::ChatNotFound(id).into()),
    }
}

/// Handler for `PUT /api/chats/{id}`.
pub async fn update_chat(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ChatUpdate>, JsonRejection>,
) -> Result<Json<ChatRecord>, ApiError> {
    let Json(update) = payload?;
    let record = state.chats.update(id, update).await?;
    info!(chat_id = %id, "Chat updated");
    Ok(Json(record))
}

/// Handler for `DELETE /api/chats/{id}`.
pub async fn delete_chat(
    State(state): State<GatewayState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.chats.delete(id).await? {
        info!(chat_id = %id, "Chat deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ChatError::ChatNotFound(id).into())
    }
}
