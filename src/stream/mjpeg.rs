//! MJPEG multipart encoding and viewer sessions

use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::events::{EventBus, SystemEvent};

/// Response content type of viewer streams
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Client ID type (UUID string)
pub type ClientId = String;

/// Wrap one JPEG as a multipart part
pub fn create_mjpeg_part(jpeg_data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + jpeg_data.len());

    buf.put_slice(b"--frame\r\n");
    buf.put_slice(b"Content-Type: image/jpeg\r\n");
    buf.put_slice(format!("Content-Length: {}\r\n", jpeg_data.len()).as_bytes());
    buf.put_slice(b"\r\n");

    buf.put_slice(jpeg_data);
    buf.put_slice(b"\r\n");

    buf.freeze()
}

/// Rolling window FPS calculator
#[derive(Debug, Clone)]
pub struct FpsCalculator {
    frame_times: VecDeque<Instant>,
    window: Duration,
}

impl FpsCalculator {
    /// 1-second window
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(64),
            window: Duration::from_secs(1),
        }
    }

    pub fn record_frame(&mut self) {
        let now = Instant::now();
        self.frame_times.push_back(now);
        while let Some(&oldest) = self.frame_times.front() {
            if now.duration_since(oldest) > self.window {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
    }

    /// Frames in the last window
    pub fn current_fps(&self) -> u32 {
        self.frame_times.len() as u32
    }
}

impl Default for FpsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct ClientSession {
    camera: String,
    connected_at: Instant,
    frames_sent: u64,
    fps: FpsCalculator,
}

/// Per-viewer statistics
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub id: String,
    pub camera: String,
    pub fps: u32,
    pub frames_sent: u64,
    pub connected_secs: u64,
}

/// Connected viewers across all cameras
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientSession>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a viewer, returning the camera's viewer count
    fn register(&self, client_id: &str, camera: &str) -> usize {
        let mut clients = self.clients.write();
        clients.insert(
            client_id.to_string(),
            ClientSession {
                camera: camera.to_string(),
                connected_at: Instant::now(),
                frames_sent: 0,
                fps: FpsCalculator::new(),
            },
        );
        clients.values().filter(|s| s.camera == camera).count()
    }

    fn unregister(&self, client_id: &str) -> Option<(ClientSession, usize)> {
        let mut clients = self.clients.write();
        let session = clients.remove(client_id)?;
        let remaining = clients
            .values()
            .filter(|s| s.camera == session.camera)
            .count();
        Some((session, remaining))
    }

    /// Record a frame handed to a viewer's connection
    pub fn record_frame_sent(&self, client_id: &str) {
        if let Some(session) = self.clients.write().get_mut(client_id) {
            session.frames_sent += 1;
            session.fps.record_frame();
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn viewers_of(&self, camera: &str) -> usize {
        self.clients
            .read()
            .values()
            .filter(|s| s.camera == camera)
            .count()
    }

    pub fn stats(&self) -> Vec<ClientStats> {
        let mut stats: Vec<ClientStats> = self
            .clients
            .read()
            .iter()
            .map(|(id, session)| ClientStats {
                id: id.clone(),
                camera: session.camera.clone(),
                fps: session.fps.current_fps(),
                frames_sent: session.frames_sent,
                connected_secs: session.connected_at.elapsed().as_secs(),
            })
            .collect();
        stats.sort_by(|a, b| a.camera.cmp(&b.camera).then(a.id.cmp(&b.id)));
        stats
    }
}

/// RAII guard for a viewer session
///
/// Registers on creation and unregisters on drop, so a viewer that vanishes
/// mid-frame is still cleaned up.
pub struct ClientGuard {
    client_id: ClientId,
    camera: String,
    registry: Arc<ClientRegistry>,
    events: Arc<EventBus>,
}

impl ClientGuard {
    pub fn new(
        client_id: ClientId,
        camera: &str,
        registry: Arc<ClientRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        let viewers = registry.register(&client_id, camera);
        info!(
            "Viewer {} connected to {} ({} viewers)",
            client_id, camera, viewers
        );
        events.publish(SystemEvent::ViewerConnected {
            camera: camera.to_string(),
            client_id: client_id.clone(),
            viewers,
        });
        Self {
            client_id,
            camera: camera.to_string(),
            registry,
            events,
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    pub fn record_frame_sent(&self) {
        self.registry.record_frame_sent(&self.client_id);
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        if let Some((session, viewers)) = self.registry.unregister(&self.client_id) {
            let secs = session.connected_at.elapsed().as_secs_f32();
            let avg_fps = if secs > 0.1 {
                session.frames_sent as f32 / secs
            } else {
                0.0
            };
            info!(
                "Viewer {} left {} after {:.1}s ({} frames, {:.1} avg FPS)",
                self.client_id, self.camera, secs, session.frames_sent, avg_fps
            );
            self.events.publish(SystemEvent::ViewerDisconnected {
                camera: self.camera.clone(),
                client_id: self.client_id.clone(),
                viewers,
                frames_sent: session.frames_sent,
            });
        }
    }
}
