//! Handlers for registering scripts and thumbnails.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use framechain_db::models::catalog::{NewScript, NewThumbnail};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/scripts
pub async fn create_script(
    State(state): State<AppState>,
    payload: Result<Json<NewScript>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    input.validate()?;

    let script = state.catalog.register_script(input).await?;
    tracing::info!(script_id = %script.id, duration_secs = script.duration_secs, "Script registered");

    Ok((StatusCode::CREATED, Json(DataResponse { data: script })))
}

/// POST /api/v1/thumbnails
///
/// The referenced script must exist.
pub async fn create_thumbnail(
    State(state): State<AppState>,
    payload: Result<Json<NewThumbnail>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    input.validate()?;

    let thumbnail = state.catalog.register_thumbnail(input).await?;
    tracing::info!(
        thumbnail_id = %thumbnail.id,
        script_id = %thumbnail.script_id,
        "Thumbnail registered",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: thumbnail })))
}
