//! Server-side rendering endpoint (`/api/render`).

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};

use mdchat_markdown::ContentOrigin;

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub content: String,
    /// Defaults to assistant content.
    #[serde(default)]
    pub role: Option<ContentOrigin>,
    /// Defaults to the gateway's `render.enhance` setting.
    #[serde(default)]
    pub enhance: Option<bool>,
}

/// Handler for `POST /api/render`.
pub async fn render(
    State(state): State<GatewayState>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload?;
    let origin = body.role.unwrap_or(ContentOrigin::Assistant);
    let html = if body.enhance.unwrap_or(state.enhance) {
        state.pipeline.render_enhanced(&body.content, origin)
    } else {
        state.pipeline.render(&body.content, origin)
    };
    Ok(Json(json!({ "html": html })))
}
