//! Recording sessions and recording files
//!
//! # Components
//!
//! - `VideoWriter` - GStreamer MJPEG AVI writer, frames stored as received
//! - `RecordingController` - Idle/Recording state machine driven by the
//!   camera's recording flag
//! - `files` - listing and deleting finished recordings

pub mod controller;
pub mod files;
pub mod info;
pub mod writer;

pub use controller::{RecordingController, RecordingState};
pub use files::{delete_recording, list_recordings, RecordingFile};
pub use info::{read_video_info, VideoInfo};
pub use writer::VideoWriter;

use gstreamer as gst;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordingError {
    /// Opening or writing the file failed; the session is aborted
    #[error("Recording I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GStreamer error: {0}")]
    Gst(#[from] gst::glib::Error),

    #[error("GStreamer state error: {0}")]
    StateChange(#[from] gst::StateChangeError),

    #[error("Recording pipeline error: {0}")]
    Pipeline(String),

    #[error("Frame is {actual:?}, session was opened at {expected:?}")]
    InvalidDimensions {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Invalid recording file name: {0}")]
    InvalidFileName(String),
}
