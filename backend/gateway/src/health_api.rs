//! Gateway Health API

use axum::{Json, extract::State};
use serde::Serialize;

use mdchat_markdown::ParserStrategy;

use crate::server::GatewayState;

pub const SERVICE_NAME: &str = "mdchat";

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub parser: ParserStrategy,
    pub uptime_seconds: u64,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.name().to_string(),
        parser: state.pipeline.strategy(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
