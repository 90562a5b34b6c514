//! Health check endpoint

use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" when the channel is connected, else "degraded")
    pub status: String,
    /// Module name ("vita-fit")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Message channel mode ("connected" | "degraded")
    pub channel: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let connected = state.channel.is_connected().await;
    let (status, channel) = if connected {
        ("ok", "connected")
    } else {
        ("degraded", "degraded")
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "vita-fit".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        channel: channel.to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
