use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Re-export Camera from camera module (the registry is persisted with the config)
pub use crate::camera::Camera;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Upstream camera stream settings
    pub ingest: IngestConfig,
    /// Motion detection settings
    pub motion: MotionConfig,
    /// Recording settings
    pub recording: RecordingConfig,
    /// Camera health check settings
    pub health: HealthConfig,
    /// Viewer stream settings
    pub stream: StreamConfig,
    /// Frame overlay settings
    pub overlay: OverlayConfig,
    /// Registered cameras
    pub cameras: Vec<Camera>,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// HTTP port
    pub http_port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Upstream camera stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Connect timeout for the camera stream request
    pub connect_timeout_secs: u64,
    /// Silence on an open stream after which the connection counts as dropped
    pub read_timeout_secs: u64,
    /// Wait between reconnection attempts
    pub reconnect_backoff_secs: u64,
    /// Consecutive failed attempts before the stream ends (0 = infinite)
    pub max_reconnect_attempts: u32,
    /// Largest buffered image before the scan buffer is discarded
    pub max_frame_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            reconnect_backoff_secs: 5,
            max_reconnect_attempts: 0, // infinite retry
            max_frame_bytes: 8 * 1024 * 1024,
        }
    }
}

impl IngestConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }
}

/// Motion detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    /// Default summed contour area that counts as motion
    pub threshold: u32,
    /// Gaussian blur sigma (1.1 matches a 5x5 kernel)
    pub blur_sigma: f32,
    /// Intensity cutoff for binarization
    pub pixel_threshold: u8,
    /// Dilation passes of a 3x3 kernel
    pub dilate_iterations: u8,
    /// Maximum pending alerts kept before the oldest are dropped
    pub alert_capacity: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: 500,
            blur_sigma: 1.1,
            pixel_threshold: 20,
            dilate_iterations: 3,
            alert_capacity: 1000,
        }
    }
}

/// Recording configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    /// Frame rate written into recording headers
    pub fps: u32,
    /// Recording directory (empty = `<data dir>/recordings`)
    pub dir: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: 20,
            dir: String::new(),
        }
    }
}

impl RecordingConfig {
    /// Resolve the recording directory against the data directory
    pub fn dir_path(&self, data_dir: &Path) -> PathBuf {
        if self.dir.trim().is_empty() {
            data_dir.join("recordings")
        } else {
            let dir = PathBuf::from(&self.dir);
            if dir.is_absolute() {
                dir
            } else {
                data_dir.join(dir)
            }
        }
    }
}

/// Camera health check configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Check cycle interval
    pub interval_secs: u64,
    /// Per-check timeout
    pub timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            timeout_secs: 3,
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Viewer stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// JPEG quality of re-encoded frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

/// Frame overlay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    /// TrueType font for overlay text (built-in bitmap font when unset)
    pub font_path: Option<String>,
    /// Text height in pixels when a TrueType font is used
    pub font_size: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 20.0,
        }
    }
}
