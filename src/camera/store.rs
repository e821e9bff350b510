//! Shared per-camera state
//!
//! Every map that pipelines, the health monitor and the control surface
//! touch concurrently lives here behind a `parking_lot` lock. Keys are the
//! canonical camera names from the registry.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use super::lease::RecordingLeases;
use super::stats::SystemStats;
use super::{CameraSettings, CameraStatus, MotionAlert};

pub struct CameraStore {
    statuses: RwLock<HashMap<String, CameraStatus>>,
    alerts: Mutex<VecDeque<MotionAlert>>,
    alert_capacity: usize,
    recording_flags: RwLock<HashMap<String, bool>>,
    settings: RwLock<HashMap<String, CameraSettings>>,
    default_threshold: u32,
    leases: Arc<RecordingLeases>,
    stats: SystemStats,
}

impl CameraStore {
    pub fn new(alert_capacity: usize, default_threshold: u32) -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            alerts: Mutex::new(VecDeque::new()),
            alert_capacity: alert_capacity.max(1),
            recording_flags: RwLock::new(HashMap::new()),
            settings: RwLock::new(HashMap::new()),
            default_threshold,
            leases: Arc::new(RecordingLeases::new()),
            stats: SystemStats::new(),
        }
    }

    // ========================================================================
    // Status table (written by the health monitor)
    // ========================================================================

    /// Store a check result, returning the previous entry
    pub fn set_status(&self, camera: &str, status: CameraStatus) -> Option<CameraStatus> {
        self.statuses.write().insert(camera.to_string(), status)
    }

    pub fn status(&self, camera: &str) -> CameraStatus {
        self.statuses
            .read()
            .get(camera)
            .cloned()
            .unwrap_or_else(CameraStatus::unknown)
    }

    /// Status of every listed camera, lazily initializing missing entries
    pub fn statuses_for(&self, cameras: &[String]) -> BTreeMap<String, CameraStatus> {
        let mut statuses = self.statuses.write();
        cameras
            .iter()
            .map(|name| {
                let status = statuses
                    .entry(name.clone())
                    .or_insert_with(CameraStatus::unknown)
                    .clone();
                (name.clone(), status)
            })
            .collect()
    }

    // ========================================================================
    // Motion alerts
    // ========================================================================

    /// Append an alert, dropping the oldest when the list is full
    pub fn push_alert(&self, alert: MotionAlert) {
        let mut alerts = self.alerts.lock();
        while alerts.len() >= self.alert_capacity {
            alerts.pop_front();
        }
        alerts.push_back(alert);
    }

    /// Read and clear all pending alerts
    pub fn drain_alerts(&self) -> Vec<MotionAlert> {
        self.alerts.lock().drain(..).collect()
    }

    pub fn pending_alerts(&self) -> usize {
        self.alerts.lock().len()
    }

    // ========================================================================
    // Recording flags (set by the control surface, observed by pipelines)
    // ========================================================================

    pub fn set_recording(&self, camera: &str, recording: bool) {
        self.recording_flags
            .write()
            .insert(camera.to_string(), recording);
    }

    pub fn is_recording_requested(&self, camera: &str) -> bool {
        self.recording_flags
            .read()
            .get(camera)
            .copied()
            .unwrap_or(false)
    }

    /// Cameras whose recording flag is currently set
    pub fn recording_requested_count(&self) -> usize {
        self.recording_flags.read().values().filter(|v| **v).count()
    }

    /// Recording leases (one active session per camera)
    pub fn leases(&self) -> &Arc<RecordingLeases> {
        &self.leases
    }

    // ========================================================================
    // Per-camera settings
    // ========================================================================

    pub fn settings(&self, camera: &str) -> CameraSettings {
        self.settings
            .read()
            .get(camera)
            .cloned()
            .unwrap_or_else(|| CameraSettings::with_threshold(self.default_threshold))
    }

    pub fn set_settings(&self, camera: &str, settings: CameraSettings) {
        self.settings.write().insert(camera.to_string(), settings);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn stats(&self) -> &SystemStats {
        &self.stats
    }

    /// Forget everything about a removed camera
    pub fn forget(&self, camera: &str) {
        self.statuses.write().remove(camera);
        self.recording_flags.write().remove(camera);
        self.settings.write().remove(camera);
        self.alerts.lock().retain(|a| a.camera != camera);
    }

    /// Clear alerts and recording flags and reset the counters
    pub fn reset(&self) {
        self.alerts.lock().clear();
        self.recording_flags.write().clear();
        self.stats.reset();
    }
}
