//! Process-wide counters

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate counters, monotonic until an explicit reset
pub struct SystemStats {
    started_at: RwLock<DateTime<Local>>,
    total_recordings: AtomicU64,
    total_motion_events: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Local>,
    pub uptime_secs: i64,
    pub total_recordings: u64,
    pub total_motion_events: u64,
}

impl SystemStats {
    pub fn new() -> Self {
        Self {
            started_at: RwLock::new(Local::now()),
            total_recordings: AtomicU64::new(0),
            total_motion_events: AtomicU64::new(0),
        }
    }

    pub fn record_recording_started(&self) -> u64 {
        self.total_recordings.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_motion_event(&self) -> u64 {
        self.total_motion_events.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let started_at = *self.started_at.read();
        StatsSnapshot {
            started_at,
            uptime_secs: (Local::now() - started_at).num_seconds().max(0),
            total_recordings: self.total_recordings.load(Ordering::Relaxed),
            total_motion_events: self.total_motion_events.load(Ordering::Relaxed),
        }
    }

    /// Restart the uptime clock and zero the counters
    pub fn reset(&self) {
        *self.started_at.write() = Local::now();
        self.total_recordings.store(0, Ordering::Relaxed);
        self.total_motion_events.store(0, Ordering::Relaxed);
    }
}

impl Default for SystemStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Format uptime the way the dashboard shows it ("3h 12m")
pub fn format_uptime(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    format!("{}h {}m", hours, minutes)
}
