//! Viewer stream endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::{viewer_stream, ClientGuard, ClientStats, MJPEG_CONTENT_TYPE};

/// MJPEG stream of one camera
///
/// Every request runs its own pipeline with its own upstream connection.
/// Unknown cameras fail with 404 before anything is started.
pub async fn video_feed(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    let camera = state.registry.require(&name)?;

    let client_id = uuid::Uuid::new_v4().to_string();
    let guard = ClientGuard::new(
        client_id,
        &camera.name,
        state.clients.clone(),
        state.events.clone(),
    );

    let body_stream = viewer_stream(camera, state.pipeline_context(), guard)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, MJPEG_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Body::from_stream(body_stream),
    )
        .into_response())
}

/// Connected viewers with per-viewer FPS
pub async fn stream_clients(State(state): State<Arc<AppState>>) -> Json<Vec<ClientStats>> {
    Json(state.clients.stats())
}
