//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,

    /// `connected` or `disconnected`
    #[schema(example = "connected")]
    pub chroma_status: String,

    pub version: String,

    pub uptime_seconds: u64,
}

/// Liveness plus vector store connectivity.
///
/// An unreachable store is reported in the body, not as a failure.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let chroma_status = match state.pipeline.store().heartbeat().await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("Vector store heartbeat failed: {}", e);
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        chroma_status: chroma_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
    })
}

/// Static probe response
#[derive(Debug, Serialize, ToSchema)]
pub struct ProbeResponse {
    #[schema(example = "API is running")]
    pub status: String,
}

/// Liveness probe that touches no dependency
#[utoipa::path(
    get,
    path = "/test",
    tag = "health",
    responses(
        (status = 200, description = "API is running", body = ProbeResponse)
    )
)]
pub async fn probe() -> impl IntoResponse {
    Json(ProbeResponse {
        status: "API is running".to_string(),
    })
}
