use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::camera::{Camera, CameraRegistry, CameraStore};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::events::{EventBus, SystemEvent};
use crate::stream::{ClientRegistry, PipelineContext};

/// Application-wide state shared across handlers
///
/// Pipelines never hold `AppState`; each viewer gets a `PipelineContext`
/// snapshot built by [`AppState::pipeline_context`].
pub struct AppState {
    /// Configuration store
    pub config: ConfigStore,
    /// Registered cameras
    pub registry: Arc<CameraRegistry>,
    /// Status, alerts, recording flags and settings
    pub cameras: Arc<CameraStore>,
    /// Connected viewers
    pub clients: Arc<ClientRegistry>,
    /// Event bus for real-time notifications
    pub events: Arc<EventBus>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
    /// Directory recordings are written to and served from
    recordings_dir: PathBuf,
}

impl AppState {
    /// Create new application state, seeding the registry from the config
    pub fn new(
        config: ConfigStore,
        events: Arc<EventBus>,
        shutdown_tx: broadcast::Sender<()>,
        recordings_dir: PathBuf,
    ) -> Arc<Self> {
        let snapshot = config.get();
        let registry = Arc::new(CameraRegistry::from_cameras(snapshot.cameras.clone()));
        let cameras = Arc::new(CameraStore::new(
            snapshot.motion.alert_capacity,
            snapshot.motion.threshold,
        ));

        info!("Loaded {} camera(s) from config", registry.len());

        Arc::new(Self {
            config,
            registry,
            cameras,
            clients: Arc::new(ClientRegistry::new()),
            events,
            shutdown_tx,
            recordings_dir,
        })
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Subscribe to shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Everything a new viewer pipeline needs
    pub fn pipeline_context(&self) -> PipelineContext {
        PipelineContext {
            config: self.config.get(),
            registry: self.registry.clone(),
            store: self.cameras.clone(),
            events: self.events.clone(),
            recordings_dir: self.recordings_dir.clone(),
            shutdown: self.shutdown_tx.clone(),
        }
    }

    /// Register a camera and persist the registry
    ///
    /// The registry change is rolled back when the config cannot be saved.
    pub async fn add_camera(&self, camera: Camera) -> Result<()> {
        self.registry.add(camera.clone())?;

        if let Err(e) = self.config.insert_camera(&camera).await {
            warn!("Failed to persist camera {}: {}", camera.name, e);
            let _ = self.registry.remove(&camera.name);
            return Err(e);
        }

        info!("Camera added: {} ({})", camera.name, camera.url);
        self.events.publish(SystemEvent::CameraAdded {
            camera: camera.name,
            url: camera.url,
        });
        Ok(())
    }

    /// Remove a camera and everything stored about it
    ///
    /// Nothing changes in memory unless the removal was persisted. Running
    /// pipelines of the camera stop recording on their next frame because
    /// the recording flag is gone.
    pub async fn remove_camera(&self, name: &str) -> Result<Camera> {
        let camera = self.registry.require(name)?;
        if let Err(e) = self.config.delete_camera(&camera.name).await {
            warn!("Failed to persist removal of camera {}: {}", camera.name, e);
            return Err(e);
        }

        let camera = self.registry.remove(&camera.name)?;
        self.cameras.forget(&camera.name);

        info!("Camera removed: {}", camera.name);
        self.events.publish(SystemEvent::CameraRemoved {
            camera: camera.name.clone(),
        });
        Ok(camera)
    }

    /// Clear alerts and recording flags and restart the counters
    pub fn reset(&self) {
        self.cameras.reset();
        info!("System state reset");
        self.events.publish(SystemEvent::SystemReset);
    }
}
