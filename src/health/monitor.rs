//! Camera health monitor
//!
//! Every cycle checks all registered cameras concurrently with a `HEAD`
//! request. A slow or dead camera only costs its own check timeout; the
//! others are recorded as soon as they answer.

use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::camera::{Camera, CameraRegistry, CameraState, CameraStatus, CameraStore};
use crate::config::HealthConfig;
use crate::events::{EventBus, SystemEvent};
use crate::utils::LogThrottler;
use crate::warn_throttled;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("{0}")]
    Request(String),
}

/// Check one endpoint and turn the outcome into a status entry
pub async fn check_camera(client: &reqwest::Client, url: &str, timeout: Duration) -> CameraStatus {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, client.head(url).send())
        .await
        .map_err(|_| CheckError::Timeout(timeout))
        .and_then(|r| r.map_err(|e| CheckError::Request(e.to_string())));
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(response) if response.status().is_success() => CameraStatus::online(latency_ms),
        Ok(response) => CameraStatus::offline(
            format!("HTTP {}", response.status().as_u16()),
            Some(latency_ms),
        ),
        Err(e) => CameraStatus::offline(e.to_string(), None),
    }
}

pub struct HealthMonitor {
    registry: Arc<CameraRegistry>,
    store: Arc<CameraStore>,
    events: Arc<EventBus>,
    client: reqwest::Client,
    interval: Duration,
    timeout: Duration,
    throttler: LogThrottler,
}

impl HealthMonitor {
    pub fn new(
        config: &HealthConfig,
        registry: Arc<CameraRegistry>,
        store: Arc<CameraStore>,
        events: Arc<EventBus>,
    ) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| CheckError::Request(e.to_string()))?;

        Ok(Self {
            registry,
            store,
            events,
            client,
            interval: config.interval(),
            timeout: config.timeout(),
            throttler: LogThrottler::with_secs(300),
        })
    }

    /// Check every registered camera once
    pub async fn check_all(&self) {
        let cameras = self.registry.list();
        if cameras.is_empty() {
            return;
        }

        let checks = cameras.iter().map(|camera| async move {
            let status = check_camera(&self.client, &camera.url, self.timeout).await;
            (camera, status)
        });
        let results = join_all(checks).await;

        let online = results
            .iter()
            .filter(|(_, s)| s.status == CameraState::Online)
            .count();
        debug!("Health check: {}/{} cameras online", online, results.len());

        for (camera, status) in results {
            self.record(camera, status);
        }
    }

    fn record(&self, camera: &Camera, status: CameraStatus) {
        // The camera may have been removed while the check was in flight
        if !self.registry.contains(&camera.name) {
            return;
        }

        let state = status.status;
        let error = status.error.clone();
        let previous = self.store.set_status(&camera.name, status);
        let changed = previous.map(|p| p.status) != Some(state);

        match state {
            CameraState::Online => {
                self.throttler.clear(&camera.name);
                if changed {
                    info!("Camera {} is online", camera.name);
                }
            }
            _ => {
                warn_throttled!(
                    self.throttler,
                    &camera.name,
                    "Camera {} is offline: {}",
                    camera.name,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        if changed {
            self.events.publish(SystemEvent::CameraStatusChanged {
                camera: camera.name.clone(),
                status: state,
                error,
            });
        }
    }

    /// Check on a fixed interval until shutdown
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "Camera health monitor started (every {}s, timeout {}s)",
            self.interval.as_secs(),
            self.timeout.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.check_all().await,
                _ = shutdown.recv() => break,
            }
        }
        info!("Camera health monitor stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
