//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vscene_media::{check_ffmpeg, check_ffprobe};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub ffmpeg: bool,
    pub jobs_tracked: usize,
    pub jobs_running: usize,
}

/// Readiness check: the media toolchain is installed.
pub async fn ready(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let ffmpeg = check_ffmpeg().is_ok() && check_ffprobe().is_ok();
    let status = if ffmpeg {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if ffmpeg { "ready" } else { "degraded" }.to_string(),
            ffmpeg,
            jobs_tracked: state.orchestrator.registry().len().await,
            jobs_running: state.orchestrator.running_jobs(),
        }),
    )
}
