//! Route definitions for scripts and thumbnails.

use axum::routing::post;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::catalog;
use crate::state::AppState;

/// Routes mounted at `/scripts`.
///
/// ```text
/// POST   /                -> create_script
/// ```
pub fn script_router(timeout: TimeoutLayer) -> Router<AppState> {
    Router::new()
        .route("/", post(catalog::create_script))
        .layer(timeout)
}

/// Routes mounted at `/thumbnails`.
///
/// ```text
/// POST   /                -> create_thumbnail
/// ```
pub fn thumbnail_router(timeout: TimeoutLayer) -> Router<AppState> {
    Router::new()
        .route("/", post(catalog::create_thumbnail))
        .layer(timeout)
}
