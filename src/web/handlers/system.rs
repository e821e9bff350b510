//! Health, statistics, alert and reset endpoints

use axum::{extract::State, Json};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;

use super::ActionResponse;
use crate::camera::{format_uptime, CameraState, MotionAlert};
use crate::state::AppState;

/// Registered cameras whose last check succeeded
fn online_cameras(state: &AppState) -> usize {
    state
        .cameras
        .statuses_for(&state.registry.names())
        .values()
        .filter(|s| s.status == CameraState::Online)
        .count()
}

#[derive(Serialize)]
pub struct ServiceStatus {
    pub camera_monitor: &'static str,
    pub motion_detection: &'static str,
    pub recording_service: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` when at least one camera is online
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Local>,
    pub cameras_online: usize,
    pub total_cameras: usize,
    pub services: ServiceStatus,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cameras_online = online_cameras(&state);
    Json(HealthResponse {
        status: if cameras_online > 0 {
            "healthy"
        } else {
            "unhealthy"
        },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Local::now(),
        cameras_online,
        total_cameras: state.registry.len(),
        services: ServiceStatus {
            camera_monitor: "running",
            motion_detection: "running",
            recording_service: "running",
        },
    })
}

#[derive(Serialize)]
pub struct SystemStatsResponse {
    pub total_cameras: usize,
    pub online_cameras: usize,
    pub offline_cameras: usize,
    /// Cameras with the recording flag set
    pub recording_cameras: usize,
    /// Cameras with an open recording file
    pub active_recordings: usize,
    /// Pending (undrained) motion alerts
    pub motion_alerts: usize,
    pub total_recordings: u64,
    pub total_motion_events: u64,
    pub viewers: usize,
    pub uptime: String,
    pub uptime_secs: i64,
    pub system_health: &'static str,
}

pub async fn system_stats(State(state): State<Arc<AppState>>) -> Json<SystemStatsResponse> {
    let total_cameras = state.registry.len();
    let online = online_cameras(&state);
    let stats = state.cameras.stats().snapshot();

    Json(SystemStatsResponse {
        total_cameras,
        online_cameras: online,
        offline_cameras: total_cameras.saturating_sub(online),
        recording_cameras: state.cameras.recording_requested_count(),
        active_recordings: state.cameras.leases().active_count(),
        motion_alerts: state.cameras.pending_alerts(),
        total_recordings: stats.total_recordings,
        total_motion_events: stats.total_motion_events,
        viewers: state.clients.client_count(),
        uptime: format_uptime(stats.uptime_secs),
        uptime_secs: stats.uptime_secs,
        system_health: if online > 0 { "healthy" } else { "degraded" },
    })
}

/// Read and clear pending motion alerts
pub async fn motion_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<MotionAlert>> {
    Json(state.cameras.drain_alerts())
}

/// Clear alerts and recording flags and reset the counters
pub async fn system_restart(State(state): State<Arc<AppState>>) -> Json<ActionResponse> {
    state.reset();
    Json(ActionResponse::ok("System restarted successfully"))
}
