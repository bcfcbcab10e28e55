pub mod catalog;
pub mod health;
pub mod jobs;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /scripts                                 register a script (POST)
/// /thumbnails                              register a thumbnail (POST)
///
/// /jobs                                    list, create
/// /jobs/{id}                               get
/// /jobs/{id}/progress                      completed / total
/// /jobs/{id}/segments/{index}              generate one segment (POST, no timeout)
/// /jobs/{id}/run                           generate all remaining segments (POST)
/// /jobs/{id}/cancel                        cancel the background run (POST)
/// ```
///
/// Every route except segment generation is bounded by `request_timeout`.
pub fn api_routes(request_timeout: Duration) -> Router<AppState> {
    let timeout = TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout);

    Router::new()
        .nest("/scripts", catalog::script_router(timeout.clone()))
        .nest("/thumbnails", catalog::thumbnail_router(timeout.clone()))
        .nest("/jobs", jobs::router(timeout))
}
