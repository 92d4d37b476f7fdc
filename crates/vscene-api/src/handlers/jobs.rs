//! Job submission and status handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use vscene_models::{JobId, JobStatus, JobView, SplitRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Response for `POST /start`.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub job_id: JobId,
    pub start_time: DateTime<Utc>,
    pub status: JobStatus,
}

/// Submit a scene-split job. Returns as soon as the job is queued.
pub async fn start_job(
    State(state): State<AppState>,
    body: Result<Json<SplitRequest>, JsonRejection>,
) -> ApiResult<Json<StartResponse>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let view = state.orchestrator.submit(request).await?;
    info!(job_id = %view.job_id, "Accepted split request");

    Ok(Json(StartResponse {
        job_id: view.job_id,
        start_time: view.created_at,
        status: view.state.status(),
    }))
}

/// Current status of a job.
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job_id = JobId::from_string(job_id);
    state
        .orchestrator
        .poll(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job {} not found", job_id)))
}
