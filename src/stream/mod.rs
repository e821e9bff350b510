//! Viewer streaming
//!
//! Each viewer request gets its own [`CameraPipeline`] running on a spawned
//! task: ingest, motion, recording, overlay, encode. Frames reach the HTTP
//! body through a channel of capacity 1, so a slow viewer slows down only
//! its own pipeline.
//!
//! N viewers of one camera open N upstream connections. Nothing is shared
//! between their pipelines except the camera state store.
//!
//! # Components
//!
//! - `ClientRegistry` / `ClientGuard` - per-viewer session bookkeeping
//! - `CameraPipeline` - the per-viewer processing chain

pub mod mjpeg;
pub mod pipeline;

pub use mjpeg::{
    create_mjpeg_part, ClientGuard, ClientRegistry, ClientStats, FpsCalculator,
    MJPEG_CONTENT_TYPE,
};
pub use pipeline::{viewer_stream, CameraPipeline, PipelineContext, PipelineError};
