//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                         -> list_jobs
/// POST   /                         -> create_job
/// GET    /{id}                     -> get_job
/// GET    /{id}/progress            -> get_progress
/// POST   /{id}/run                 -> start_run
/// POST   /{id}/cancel              -> cancel_run
/// POST   /{id}/segments/{index}    -> generate_segment
/// ```
///
/// `timeout` applies to every route except `generate_segment`, which is
/// added after the layer.
pub fn router(timeout: TimeoutLayer) -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/progress", get(jobs::get_progress))
        .route("/{id}/run", post(jobs::start_run))
        .route("/{id}/cancel", post(jobs::cancel_run))
        .layer(timeout)
        .route("/{id}/segments/{index}", post(jobs::generate_segment))
}
