//! Camera data types shared by the registry, pipelines and control surface

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A registered camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Camera {
    /// Unique name (compared case-insensitively)
    pub name: String,
    /// MJPEG endpoint URL
    pub url: String,
}

impl Camera {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build a camera from user input, trimming and validating both fields
    pub fn parse(name: &str, url: &str) -> Result<Self> {
        let name = name.trim();
        let url = url.trim();

        if name.is_empty() || url.is_empty() {
            return Err(AppError::BadRequest(
                "Camera name and URL are required".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(AppError::BadRequest(
                "Camera name must not contain '/'".to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::BadRequest(
                "URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self::new(name, url))
    }

    /// Case-insensitive name comparison
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Camera reachability state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl std::fmt::Display for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraState::Online => write!(f, "online"),
            CameraState::Offline => write!(f, "offline"),
            CameraState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Latest health check result for one camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CameraStatus {
    pub status: CameraState,
    /// None until the first check
    pub last_check: Option<DateTime<Local>>,
    /// Check round-trip in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Failure reason of the last check
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CameraStatus {
    /// Placeholder for cameras that were never checked
    pub fn unknown() -> Self {
        Self {
            status: CameraState::Unknown,
            last_check: None,
            latency_ms: None,
            error: Some("Not checked yet".to_string()),
        }
    }

    pub fn online(latency_ms: f64) -> Self {
        Self {
            status: CameraState::Online,
            last_check: Some(Local::now()),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn offline(reason: impl Into<String>, latency_ms: Option<f64>) -> Self {
        Self {
            status: CameraState::Offline,
            last_check: Some(Local::now()),
            latency_ms,
            error: Some(reason.into()),
        }
    }
}

/// Motion detected on a camera
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionAlert {
    pub camera: String,
    pub timestamp: DateTime<Local>,
    /// Summed contour area that triggered the alert
    pub area: f64,
}

/// Per-camera tuning, defaults apply until set through the control surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    /// Motion threshold (summed contour area)
    pub motion_sensitivity: u32,
    /// Run motion detection for this camera
    pub motion_enabled: bool,
    /// Append detections to the alert list
    pub notification_enabled: bool,
}

impl CameraSettings {
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            motion_sensitivity: threshold,
            ..Self::default()
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            motion_sensitivity: 500,
            motion_enabled: true,
            notification_enabled: true,
        }
    }
}
