//! Camera registry, status and settings endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ActionResponse;
use crate::camera::{Camera, CameraSettings, CameraState, CameraStatus};
use crate::error::Result;
use crate::state::AppState;

/// Camera as shown in listings
#[derive(Serialize)]
pub struct CameraInfo {
    pub name: String,
    pub url: String,
    pub status: CameraState,
    /// Recording flag
    pub recording: bool,
    /// Connected viewers
    pub viewers: usize,
}

impl CameraInfo {
    fn build(state: &AppState, camera: Camera) -> Self {
        Self {
            status: state.cameras.status(&camera.name).status,
            recording: state.cameras.is_recording_requested(&camera.name),
            viewers: state.clients.viewers_of(&camera.name),
            name: camera.name,
            url: camera.url,
        }
    }
}

pub async fn list_cameras(State(state): State<Arc<AppState>>) -> Json<Vec<CameraInfo>> {
    let cameras = state
        .registry
        .list()
        .into_iter()
        .map(|camera| CameraInfo::build(&state, camera))
        .collect();
    Json(cameras)
}

#[derive(Deserialize)]
pub struct AddCameraRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize)]
pub struct AddCameraResponse {
    pub success: bool,
    pub message: String,
    pub camera: CameraInfo,
}

pub async fn add_camera(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddCameraRequest>,
) -> Result<Json<AddCameraResponse>> {
    let camera = Camera::parse(&req.name, &req.url)?;
    state.add_camera(camera.clone()).await?;

    Ok(Json(AddCameraResponse {
        success: true,
        message: format!("Camera '{}' added successfully", camera.name),
        camera: CameraInfo::build(&state, camera),
    }))
}

pub async fn remove_camera(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ActionResponse>> {
    let camera = state.remove_camera(&name).await?;
    Ok(Json(ActionResponse::ok(format!(
        "Camera '{}' removed successfully",
        camera.name
    ))))
}

/// Status of every registered camera; never-checked cameras read as unknown
pub async fn camera_status(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, CameraStatus>> {
    Json(state.cameras.statuses_for(&state.registry.names()))
}

// ============================================================================
// Settings
// ============================================================================

pub async fn get_camera_settings(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<CameraSettings>> {
    let camera = state.registry.require(&name)?;
    Ok(Json(state.cameras.settings(&camera.name)))
}

/// Partial settings update, unset fields keep their current value
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CameraSettingsUpdate {
    pub motion_sensitivity: Option<u32>,
    pub motion_enabled: Option<bool>,
    pub notification_enabled: Option<bool>,
}

impl CameraSettingsUpdate {
    fn apply_to(self, settings: &mut CameraSettings) {
        if let Some(v) = self.motion_sensitivity {
            settings.motion_sensitivity = v;
        }
        if let Some(v) = self.motion_enabled {
            settings.motion_enabled = v;
        }
        if let Some(v) = self.notification_enabled {
            settings.notification_enabled = v;
        }
    }
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    pub settings: CameraSettings,
}

pub async fn update_camera_settings(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(update): Json<CameraSettingsUpdate>,
) -> Result<Json<SettingsResponse>> {
    let camera = state.registry.require(&name)?;

    let mut settings = state.cameras.settings(&camera.name);
    update.apply_to(&mut settings);
    state.cameras.set_settings(&camera.name, settings.clone());
    tracing::info!("Settings updated for {}: {:?}", camera.name, settings);

    Ok(Json(SettingsResponse {
        success: true,
        settings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_update_merges() {
        let mut settings = CameraSettings::with_threshold(500);
        let update: CameraSettingsUpdate =
            serde_json::from_str(r#"{"motion_enabled": false}"#).unwrap();
        update.apply_to(&mut settings);

        assert!(!settings.motion_enabled);
        assert_eq!(settings.motion_sensitivity, 500);
        assert!(settings.notification_enabled);
    }
}
