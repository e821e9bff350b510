//! Per-viewer camera pipeline
//!
//! ```text
//! FrameIngestor -> MotionDetector -> RecordingController -> FrameRenderer -> JPEG -> multipart
//! ```
//!
//! Frames are handled strictly in arrival order. Only undecodable frames
//! are dropped; a slow viewer blocks the pipeline on the channel send.

use bytes::Bytes;
use chrono::Local;
use futures::{Stream, StreamExt};
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use super::mjpeg::{create_mjpeg_part, ClientGuard};
use crate::camera::{Camera, CameraRegistry, CameraStore, MotionAlert};
use crate::config::AppConfig;
use crate::events::{EventBus, SystemEvent};
use crate::ingest::{FrameIngestor, IngestError};
use crate::motion::MotionDetector;
use crate::overlay::FrameRenderer;
use crate::recording::RecordingController;
use crate::utils::LogThrottler;
use crate::video::{CodecError, Frame, JpegEncoder};
use crate::warn_throttled;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Overlay font unusable: {0}")]
    Font(#[from] ab_glyph::InvalidFont),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Everything a pipeline needs from the application
#[derive(Clone)]
pub struct PipelineContext {
    /// Config snapshot taken when the viewer connected
    pub config: Arc<AppConfig>,
    pub registry: Arc<CameraRegistry>,
    pub store: Arc<CameraStore>,
    pub events: Arc<EventBus>,
    pub recordings_dir: PathBuf,
    pub shutdown: broadcast::Sender<()>,
}

pub struct CameraPipeline {
    camera: Camera,
    detector: MotionDetector,
    recorder: RecordingController,
    renderer: FrameRenderer,
    encoder: JpegEncoder,
    previous: Option<RgbImage>,
    throttler: LogThrottler,
    ctx: PipelineContext,
}

impl CameraPipeline {
    pub fn new(camera: Camera, ctx: PipelineContext) -> Result<Self, PipelineError> {
        let config = &ctx.config;
        Ok(Self {
            detector: MotionDetector::new(&config.motion),
            recorder: RecordingController::new(
                camera.name.clone(),
                ctx.recordings_dir.clone(),
                &config.recording,
                ctx.store.clone(),
                ctx.events.clone(),
            ),
            renderer: FrameRenderer::new(&config.overlay)?,
            encoder: JpegEncoder::new(config.stream.jpeg_quality)?,
            previous: None,
            throttler: LogThrottler::with_secs(30),
            camera,
            ctx,
        })
    }

    /// Run one frame through every stage and return its multipart part
    pub fn process(&mut self, mut frame: Frame) -> Result<Bytes, CodecError> {
        self.detect_motion(&frame);
        self.previous = Some(frame.image().clone());

        let recording = self.recorder.process(&frame);

        self.renderer
            .render(frame.image_mut(), Local::now(), recording);

        let jpeg = self.encoder.encode(frame.image())?;
        Ok(create_mjpeg_part(&jpeg))
    }

    fn detect_motion(&self, frame: &Frame) {
        let Some(previous) = &self.previous else {
            return;
        };
        let name = &self.camera.name;
        if !self.ctx.registry.contains(name) {
            return;
        }
        let settings = self.ctx.store.settings(name);
        if !settings.motion_enabled {
            return;
        }

        let area = match self.detector.motion_area(previous, frame.image()) {
            Ok(area) => area,
            Err(e) => {
                debug!("Motion detection for {} skipped: {}", name, e);
                return;
            }
        };
        if area <= f64::from(settings.motion_sensitivity) {
            return;
        }

        let timestamp = Local::now();
        let total = self.ctx.store.stats().record_motion_event();
        debug!(
            "Motion on {}: area {:.0} > {} (event #{})",
            name, area, settings.motion_sensitivity, total
        );
        if settings.notification_enabled {
            self.ctx.store.push_alert(MotionAlert {
                camera: name.clone(),
                timestamp,
                area,
            });
        }
        self.ctx.events.publish(SystemEvent::MotionDetected {
            camera: name.clone(),
            area,
            timestamp,
        });
    }

    /// Drive the pipeline until the viewer leaves, the ingestor gives up or
    /// the server shuts down
    pub async fn run(mut self, ingestor: FrameIngestor, tx: mpsc::Sender<Bytes>) {
        let name = self.camera.name.clone();
        let mut shutdown = self.ctx.shutdown.subscribe();
        let frames = ingestor.frames();
        tokio::pin!(frames);

        loop {
            let item = tokio::select! {
                item = frames.next() => item,
                _ = tx.closed() => {
                    debug!("Viewer of {} went away", name);
                    break;
                }
                _ = shutdown.recv() => {
                    debug!("Pipeline for {} stopping on shutdown", name);
                    break;
                }
            };

            match item {
                Some(Ok(frame)) => match self.process(frame) {
                    Ok(part) => {
                        if tx.send(part).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn_throttled!(
                            self.throttler,
                            "encode",
                            "Failed to encode frame for {}: {}",
                            name,
                            e
                        );
                    }
                },
                // Already logged by the ingestor
                Some(Err(IngestError::Decode { .. })) => {}
                Some(Err(IngestError::Connection {
                    camera,
                    attempt,
                    reason,
                })) => {
                    // A dropped connection ends any open recording file
                    self.recorder.stop();
                    self.ctx.events.publish(SystemEvent::StreamReconnecting {
                        camera,
                        attempt,
                        reason,
                    });
                }
                Some(Err(e)) => {
                    error!("Pipeline for {} failed: {}", name, e);
                    break;
                }
                None => {
                    info!("Stream for {} ended", name);
                    break;
                }
            }
        }
        // Dropping self finalizes any open recording
    }
}

/// Start a pipeline for one viewer and return the response body stream
///
/// The guard lives as long as the body, so the viewer is unregistered when
/// the HTTP connection closes.
pub fn viewer_stream(
    camera: Camera,
    ctx: PipelineContext,
    guard: ClientGuard,
) -> Result<impl Stream<Item = Result<Bytes, std::io::Error>> + Send, PipelineError> {
    let ingestor = FrameIngestor::new(camera.clone(), ctx.config.ingest.clone())?;
    let pipeline = CameraPipeline::new(camera, ctx)?;

    // Capacity 1: the pipeline waits until the previous part was taken
    let (tx, mut rx) = mpsc::channel::<Bytes>(1);
    tokio::spawn(pipeline.run(ingestor, tx));

    Ok(async_stream::stream! {
        while let Some(part) = rx.recv().await {
            yield Ok::<Bytes, std::io::Error>(part);
            guard.record_frame_sent();
        }
    })
}
