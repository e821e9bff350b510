//! Recording flag and recording file endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::ActionResponse;
use crate::error::{AppError, Result};
use crate::events::SystemEvent;
use crate::recording::{self, RecordingFile};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RecordingFlagResponse {
    pub success: bool,
    pub camera: String,
    /// Recording flag after the change
    pub recording: bool,
    /// A pipeline currently writes a file for this camera
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Set or clear a camera's recording flag (`start` / `stop`)
///
/// Only the flag changes here. Pipelines of the camera open or close the
/// file on their next frame.
pub async fn control_recording(
    State(state): State<Arc<AppState>>,
    Path((name, action)): Path<(String, String)>,
) -> Result<Json<RecordingFlagResponse>> {
    let camera = state.registry.require(&name)?;

    let recording = match action.as_str() {
        "start" => true,
        "stop" => false,
        _ => {
            return Err(AppError::BadRequest(
                "Invalid action. Use 'start' or 'stop'".to_string(),
            ))
        }
    };

    state.cameras.set_recording(&camera.name, recording);
    info!(
        "Recording flag for {} set to {} ({})",
        camera.name, recording, action
    );
    state.events.publish(SystemEvent::RecordingFlagChanged {
        camera: camera.name.clone(),
        recording,
    });

    Ok(Json(RecordingFlagResponse {
        success: true,
        active: state.cameras.leases().is_held(&camera.name),
        camera: camera.name,
        recording,
        action: Some(action),
    }))
}

pub async fn recording_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<RecordingFlagResponse>> {
    let camera = state.registry.require(&name)?;
    Ok(Json(RecordingFlagResponse {
        success: true,
        recording: state.cameras.is_recording_requested(&camera.name),
        active: state.cameras.leases().is_held(&camera.name),
        camera: camera.name,
        action: None,
    }))
}

/// Finished and in-progress recordings, newest first
pub async fn list_recordings(State(state): State<Arc<AppState>>) -> Result<Json<Vec<RecordingFile>>> {
    let dir = state.recordings_dir().to_path_buf();
    let files = tokio::task::spawn_blocking(move || recording::list_recordings(&dir))
        .await
        .map_err(|e| AppError::Internal(format!("Recording scan task failed: {}", e)))??;
    Ok(Json(files))
}

pub async fn delete_recording(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Json<ActionResponse>> {
    if recording::delete_recording(state.recordings_dir(), &filename)? {
        info!("Recording deleted: {}", filename);
        Ok(Json(ActionResponse::ok(format!(
            "Recording {} deleted",
            filename
        ))))
    } else {
        Err(AppError::NotFound(format!("Recording not found: {}", filename)))
    }
}
