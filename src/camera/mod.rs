//! Camera registry and shared per-camera state
//!
//! # Components
//!
//! - `CameraRegistry` - registered cameras, case-insensitive names
//! - `CameraStore` - status table, motion alerts, recording flags, settings
//! - `RecordingLeases` - at most one recording session per camera
//! - `SystemStats` - aggregate counters

pub mod lease;
pub mod registry;
pub mod stats;
pub mod store;
pub mod types;

pub use lease::{RecordingLease, RecordingLeases};
pub use registry::CameraRegistry;
pub use stats::{format_uptime, StatsSnapshot, SystemStats};
pub use store::CameraStore;
pub use types::{Camera, CameraSettings, CameraState, CameraStatus, MotionAlert};
