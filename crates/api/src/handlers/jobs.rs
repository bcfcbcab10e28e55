//! Handlers for the `/jobs` resource.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use framechain_core::error::CoreError;
use framechain_core::types::{JobId, SegmentIndex};
use framechain_db::models::status::JobStatus;
use framechain_pipeline::CreateJob;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Create / read
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a job from a script and one of its thumbnails. Returns 201 with
/// `{ job_id, total_segments }`.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJob>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let created = state.coordinator.create_job(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.coordinator.list_jobs().await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.coordinator.get_job(job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let progress = state.coordinator.progress(job_id).await?;
    Ok(Json(DataResponse { data: progress }))
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSegment {
    #[validate(url)]
    pub seed_image_url: String,
}

#[derive(Debug, Serialize)]
pub struct SegmentOutput {
    pub video_url: String,
    pub frame_url: String,
}

/// POST /api/v1/jobs/{id}/segments/{index}
///
/// Generate one segment and wait for it. Long-running: the request stays
/// open while the provider renders the clip. A completed segment is
/// returned as stored. A client that disconnects cancels the generation.
pub async fn generate_segment(
    State(state): State<AppState>,
    Path((job_id, index)): Path<(JobId, SegmentIndex)>,
    payload: Result<Json<GenerateSegment>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    input.validate()?;

    // The generation runs in its own task so that a client disconnect, which
    // drops this future and the guard, still reaches the poll loop and
    // cancels the remote task.
    let cancel = state.shutdown.child_token();
    let _disconnect = cancel.clone().drop_guard();
    let orchestrator = Arc::clone(&state.orchestrator);
    let seed_image_url = input.seed_image_url;
    let result = tokio::spawn(async move {
        orchestrator
            .generate_segment(job_id, index, &seed_image_url, &cancel)
            .await
    })
    .await
    .map_err(|e| AppError::InternalError(format!("Segment task aborted: {e}")))??;

    Ok(Json(DataResponse {
        data: SegmentOutput {
            video_url: result.video_url,
            frame_url: result.frame_url,
        },
    }))
}

// ---------------------------------------------------------------------------
// Background runs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunStatus {
    pub job_id: JobId,
    pub running: bool,
    pub next_segment_index: Option<SegmentIndex>,
}

/// POST /api/v1/jobs/{id}/run
///
/// Start generating every remaining segment in the background. Returns
/// 202; poll `/progress` to follow along. 409 if the job has failed or a
/// run is already in progress.
pub async fn start_run(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.coordinator.get_job(job_id).await?;
    if job.status == JobStatus::Failed {
        return Err(CoreError::JobFailed(
            job.failure_message.unwrap_or_else(|| job_id.to_string()),
        )
        .into());
    }

    let next_segment_index = job.next_pending_index();
    if next_segment_index.is_some() {
        // The handle is dropped; the run reports through the store.
        state.runs.start(job_id)?;
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunStatus {
                job_id,
                running: next_segment_index.is_some(),
                next_segment_index,
            },
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CancelResult {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// POST /api/v1/jobs/{id}/cancel
///
/// Cancel the background run for a job. `cancelled` is false when no run
/// was in progress. The job itself is left as is and can be run again.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.coordinator.get_job(job_id).await?;
    let cancelled = state.runs.cancel(job_id);
    if cancelled {
        tracing::info!(job_id = %job_id, "Run cancellation requested");
    }
    Ok(Json(DataResponse {
        data: CancelResult { job_id, cancelled },
    }))
}
