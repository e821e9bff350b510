//! Long-lived camera connection
//!
//! [`FrameIngestor::frames`] is a lazy stream that never ends on its own
//! unless a reconnect limit is configured. Dropping it closes the upstream
//! connection.

use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::FrameExtractor;
use crate::camera::Camera;
use crate::config::IngestConfig;
use crate::utils::LogThrottler;
use crate::video::{CodecError, Frame, JpegDecoder};
use crate::warn_throttled;

#[derive(Debug, Error)]
pub enum IngestError {
    /// One corrupt image; the stream continues with the next
    #[error("Failed to decode frame from {camera}: {reason}")]
    Decode { camera: String, reason: String },

    /// Upstream unreachable or dropped; the ingestor backs off and reconnects
    #[error("Connection to {camera} failed (attempt {attempt}): {reason}")]
    Connection {
        camera: String,
        attempt: u32,
        reason: String,
    },

    /// The ingestor could not be set up at all
    #[error("Ingestor setup failed: {0}")]
    Setup(String),
}

impl IngestError {
    pub fn is_decode(&self) -> bool {
        matches!(self, IngestError::Decode { .. })
    }
}

impl From<CodecError> for IngestError {
    fn from(e: CodecError) -> Self {
        IngestError::Setup(e.to_string())
    }
}

pub struct FrameIngestor {
    camera: Camera,
    config: IngestConfig,
    client: reqwest::Client,
    throttler: Arc<LogThrottler>,
}

impl FrameIngestor {
    pub fn new(camera: Camera, config: IngestConfig) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| IngestError::Setup(e.to_string()))?;

        Ok(Self {
            camera,
            config,
            client,
            throttler: Arc::new(LogThrottler::with_secs(30)),
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Stream of decoded frames in arrival order
    ///
    /// Decode failures and connection failures are yielded as errors so the
    /// caller can count or report them; neither ends the stream.
    pub fn frames(self) -> impl Stream<Item = Result<Frame, IngestError>> + Send {
        stream! {
            let Self { camera, config, client, throttler } = self;
            let name = camera.name.clone();

            let mut decoder = match JpegDecoder::new() {
                Ok(decoder) => decoder,
                Err(e) => {
                    yield Err(IngestError::from(e));
                    return;
                }
            };

            let read_timeout = config.read_timeout();
            let mut sequence: u64 = 0;
            let mut failures: u32 = 0;

            loop {
                debug!("Connecting to camera {} at {}", name, camera.url);

                let reason = match client.get(&camera.url).send().await {
                    Ok(response) if response.status().is_success() => {
                        info!("Connected to camera {}", name);
                        let mut extractor = FrameExtractor::new(config.max_frame_bytes);
                        let mut body = response.bytes_stream();
                        let mut body_error = None;

                        loop {
                            let chunk = match tokio::time::timeout(read_timeout, body.next()).await {
                                Ok(Some(Ok(chunk))) => chunk,
                                Ok(Some(Err(e))) => {
                                    body_error = Some(e.to_string());
                                    break;
                                }
                                Ok(None) => break,
                                Err(_) => {
                                    body_error = Some(format!(
                                        "no data for {}s",
                                        read_timeout.as_secs()
                                    ));
                                    break;
                                }
                            };

                            extractor.push(&chunk);
                            for jpeg in extractor.drain() {
                                match decoder.decode(&jpeg) {
                                    Ok(image) => {
                                        failures = 0;
                                        let frame = Frame::new(jpeg, image, sequence);
                                        sequence += 1;
                                        yield Ok(frame);
                                    }
                                    Err(e) => {
                                        warn_throttled!(
                                            throttler,
                                            "decode",
                                            "Skipping undecodable frame from {}: {}",
                                            name,
                                            e
                                        );
                                        yield Err(IngestError::Decode {
                                            camera: name.clone(),
                                            reason: e.to_string(),
                                        });
                                    }
                                }
                            }
                        }

                        body_error.unwrap_or_else(|| "stream ended".to_string())
                    }
                    Ok(response) => format!("HTTP {}", response.status().as_u16()),
                    Err(e) => e.to_string(),
                };

                failures = failures.saturating_add(1);
                warn_throttled!(
                    throttler,
                    "connection",
                    "Camera {} disconnected ({}), retrying in {}s",
                    name,
                    reason,
                    config.reconnect_backoff_secs
                );
                yield Err(IngestError::Connection {
                    camera: name.clone(),
                    attempt: failures,
                    reason,
                });

                if config.max_reconnect_attempts > 0 && failures >= config.max_reconnect_attempts {
                    info!("Giving up on camera {} after {} attempts", name, failures);
                    return;
                }

                tokio::time::sleep(config.reconnect_backoff()).await;
            }
        }
    }
}
