//! Per-camera recording lease
//!
//! Every viewer runs its own pipeline, so several pipelines may observe the
//! same recording flag. The lease makes sure only one of them writes a file
//! for a camera at a time. Dropping the lease releases the camera.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Default)]
pub struct RecordingLeases {
    /// Camera name -> owning pipeline id
    holders: Mutex<HashMap<String, u64>>,
    next_owner: AtomicU64,
}

impl RecordingLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the recorder for `camera`
    pub fn try_acquire(self: &Arc<Self>, camera: &str) -> Option<RecordingLease> {
        let mut holders = self.holders.lock();
        if holders.contains_key(camera) {
            return None;
        }
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed) + 1;
        holders.insert(camera.to_string(), owner);
        trace!("Recording lease for {} acquired by {}", camera, owner);
        Some(RecordingLease {
            camera: camera.to_string(),
            owner,
            leases: self.clone(),
        })
    }

    /// Whether any pipeline currently records `camera`
    pub fn is_held(&self, camera: &str) -> bool {
        self.holders.lock().contains_key(camera)
    }

    /// Number of cameras currently being recorded
    pub fn active_count(&self) -> usize {
        self.holders.lock().len()
    }

    fn release(&self, camera: &str, owner: u64) {
        let mut holders = self.holders.lock();
        if holders.get(camera) == Some(&owner) {
            holders.remove(camera);
            trace!("Recording lease for {} released by {}", camera, owner);
        }
    }
}

/// RAII guard for a camera's recording lease
pub struct RecordingLease {
    camera: String,
    owner: u64,
    leases: Arc<RecordingLeases>,
}

impl RecordingLease {
    pub fn camera(&self) -> &str {
        &self.camera
    }
}

impl std::fmt::Debug for RecordingLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingLease")
            .field("camera", &self.camera)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for RecordingLease {
    fn drop(&mut self) {
        self.leases.release(&self.camera, self.owner);
    }
}
