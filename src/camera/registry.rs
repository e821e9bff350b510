//! Camera registry
//!
//! In-memory list of cameras, seeded from `AppConfig.cameras`. Names are
//! unique case-insensitively; the registered spelling is the canonical key
//! for every per-camera map.

use parking_lot::RwLock;

use super::Camera;
use crate::error::{AppError, Result};

#[derive(Default)]
pub struct CameraRegistry {
    cameras: RwLock<Vec<Camera>>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry, dropping case-insensitive duplicates
    pub fn from_cameras(cameras: impl IntoIterator<Item = Camera>) -> Self {
        let registry = Self::new();
        for camera in cameras {
            if let Err(e) = registry.add(camera) {
                tracing::warn!("Skipping camera from config: {}", e);
            }
        }
        registry
    }

    /// Snapshot of all cameras in registration order
    pub fn list(&self) -> Vec<Camera> {
        self.cameras.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.cameras.read().iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cameras.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.read().is_empty()
    }

    /// Look up a camera by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<Camera> {
        self.cameras.read().iter().find(|c| c.is_named(name)).cloned()
    }

    /// Look up a camera or fail with `NotFound`
    pub fn require(&self, name: &str) -> Result<Camera> {
        self.get(name).ok_or_else(|| AppError::camera_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cameras.read().iter().any(|c| c.is_named(name))
    }

    /// Register a camera; names are unique case-insensitively
    pub fn add(&self, camera: Camera) -> Result<()> {
        let mut cameras = self.cameras.write();
        if cameras.iter().any(|c| c.is_named(&camera.name)) {
            return Err(AppError::Conflict(format!(
                "Camera name '{}' already exists. Please choose a different name.",
                camera.name
            )));
        }
        cameras.push(camera);
        Ok(())
    }

    /// Remove a camera, returning the removed entry
    pub fn remove(&self, name: &str) -> Result<Camera> {
        let mut cameras = self.cameras.write();
        let index = cameras
            .iter()
            .position(|c| c.is_named(name))
            .ok_or_else(|| AppError::camera_not_found(name))?;
        Ok(cameras.remove(index))
    }
}
