//! System event types
//!
//! Defines all event types that can be broadcast through the event bus.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::camera::CameraState;

/// System event enumeration
///
/// JSON structure like:
/// ```json
/// {
///   "event": "motion.detected",
///   "data": { "camera": "porch", "area": 1834.5, "timestamp": "..." }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SystemEvent {
    // ============================================================================
    // Camera Registry & Health Events
    // ============================================================================
    /// Camera was registered
    #[serde(rename = "camera.added")]
    CameraAdded { camera: String, url: String },

    /// Camera was removed from the registry
    #[serde(rename = "camera.removed")]
    CameraRemoved { camera: String },

    /// Health check result changed a camera's reachability
    #[serde(rename = "camera.status_changed")]
    CameraStatusChanged {
        camera: String,
        status: CameraState,
        /// Failure reason when offline
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    // ============================================================================
    // Motion Events
    // ============================================================================
    /// Motion exceeded the camera's threshold
    #[serde(rename = "motion.detected")]
    MotionDetected {
        camera: String,
        /// Summed contour area
        area: f64,
        timestamp: DateTime<Local>,
    },

    // ============================================================================
    // Recording Events
    // ============================================================================
    /// Recording flag changed through the control surface
    #[serde(rename = "recording.flag_changed")]
    RecordingFlagChanged { camera: String, recording: bool },

    /// A recording file was opened
    #[serde(rename = "recording.started")]
    RecordingStarted { camera: String, file: String },

    /// A recording file was finalized
    #[serde(rename = "recording.stopped")]
    RecordingStopped {
        camera: String,
        file: String,
        /// Frames written into the file
        frames: u32,
    },

    /// Recording aborted on an I/O error (the stream keeps running)
    #[serde(rename = "recording.failed")]
    RecordingFailed { camera: String, reason: String },

    // ============================================================================
    // Viewer Stream Events
    // ============================================================================
    /// Viewer connected to a camera stream
    #[serde(rename = "stream.viewer_connected")]
    ViewerConnected {
        camera: String,
        client_id: String,
        /// Viewers of this camera after the change
        viewers: usize,
    },

    /// Viewer left a camera stream
    #[serde(rename = "stream.viewer_disconnected")]
    ViewerDisconnected {
        camera: String,
        client_id: String,
        viewers: usize,
        frames_sent: u64,
    },

    /// Upstream camera connection dropped, ingestor is backing off
    #[serde(rename = "stream.reconnecting")]
    StreamReconnecting {
        camera: String,
        attempt: u32,
        reason: String,
    },

    // ============================================================================
    // System Events
    // ============================================================================
    /// Alerts, recording flags and counters were reset
    #[serde(rename = "system.reset")]
    SystemReset,

    /// Generic error notification
    #[serde(rename = "error")]
    Error { message: String },
}

impl SystemEvent {
    /// Get the event name (for filtering/routing)
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::CameraAdded { .. } => "camera.added",
            Self::CameraRemoved { .. } => "camera.removed",
            Self::CameraStatusChanged { .. } => "camera.status_changed",
            Self::MotionDetected { .. } => "motion.detected",
            Self::RecordingFlagChanged { .. } => "recording.flag_changed",
            Self::RecordingStarted { .. } => "recording.started",
            Self::RecordingStopped { .. } => "recording.stopped",
            Self::RecordingFailed { .. } => "recording.failed",
            Self::ViewerConnected { .. } => "stream.viewer_connected",
            Self::ViewerDisconnected { .. } => "stream.viewer_disconnected",
            Self::StreamReconnecting { .. } => "stream.reconnecting",
            Self::SystemReset => "system.reset",
            Self::Error { .. } => "error",
        }
    }

    /// Camera the event is about, if any
    pub fn camera(&self) -> Option<&str> {
        match self {
            Self::CameraAdded { camera, .. }
            | Self::CameraRemoved { camera }
            | Self::CameraStatusChanged { camera, .. }
            | Self::MotionDetected { camera, .. }
            | Self::RecordingFlagChanged { camera, .. }
            | Self::RecordingStarted { camera, .. }
            | Self::RecordingStopped { camera, .. }
            | Self::RecordingFailed { camera, .. }
            | Self::ViewerConnected { camera, .. }
            | Self::ViewerDisconnected { camera, .. }
            | Self::StreamReconnecting { camera, .. } => Some(camera),
            Self::SystemReset | Self::Error { .. } => None,
        }
    }

    /// Check if event name matches a topic pattern
    ///
    /// Supports wildcards:
    /// - `*` matches all events
    /// - `motion.*` matches all motion events
    /// - `motion.detected` matches exact event
    pub fn matches_topic(&self, topic: &str) -> bool {
        if topic == "*" {
            return true;
        }

        let event_name = self.event_name();

        if topic.ends_with(".*") {
            let prefix = topic.trim_end_matches(".*");
            event_name.starts_with(prefix)
        } else {
            event_name == topic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let event = SystemEvent::MotionDetected {
            camera: "porch".to_string(),
            area: 900.0,
            timestamp: Local::now(),
        };
        assert_eq!(event.event_name(), "motion.detected");

        let event = SystemEvent::RecordingStopped {
            camera: "porch".to_string(),
            file: "porch_20240101_120000.avi".to_string(),
            frames: 50,
        };
        assert_eq!(event.event_name(), "recording.stopped");
    }

    #[test]
    fn test_camera() {
        assert_eq!(
            SystemEvent::CameraRemoved {
                camera: "porch".to_string()
            }
            .camera(),
            Some("porch")
        );
        assert_eq!(SystemEvent::SystemReset.camera(), None);
    }

    #[test]
    fn test_matches_topic() {
        let event = SystemEvent::RecordingStarted {
            camera: "porch".to_string(),
            file: "x.avi".to_string(),
        };

        assert!(event.matches_topic("*"));
        assert!(event.matches_topic("recording.*"));
        assert!(event.matches_topic("recording.started"));
        assert!(!event.matches_topic("recording.stopped"));
        assert!(!event.matches_topic("motion.*"));
    }

    #[test]
    fn test_serialized_shape() {
        let event = SystemEvent::CameraStatusChanged {
            camera: "porch".to_string(),
            status: CameraState::Offline,
            error: Some("timed out".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "camera.status_changed");
        assert_eq!(json["data"]["status"], "offline");
        assert_eq!(json["data"]["error"], "timed out");
    }
}
