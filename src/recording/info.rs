//! Reading back the properties of a finished recording

use gstreamer as gst;
use gstreamer_pbutils as gst_pbutils;
use std::path::Path;

use super::RecordingError;

const DISCOVER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frames: u32,
    pub duration_secs: f64,
}

/// Inspect a recording with the GStreamer discoverer
pub fn read_video_info(path: &Path) -> Result<VideoInfo, RecordingError> {
    gst::init()?;
    // Discoverer works on URIs, which must be absolute
    let path = std::fs::canonicalize(path)?;
    let uri = gst::glib::filename_to_uri(&path, None)?;

    let discoverer =
        gst_pbutils::Discoverer::new(gst::ClockTime::from_seconds(DISCOVER_TIMEOUT_SECS))?;
    let info = discoverer.discover_uri(&uri)?;

    let video = info
        .video_streams()
        .into_iter()
        .next()
        .ok_or_else(|| RecordingError::Pipeline(format!("{} has no video stream", path.display())))?;

    let duration_secs = info
        .duration()
        .map(|d| d.nseconds() as f64 / gst::ClockTime::SECOND.nseconds() as f64)
        .unwrap_or(0.0);
    let framerate = video.framerate();
    let fps = if framerate.denom() > 0 {
        f64::from(framerate.numer()) / f64::from(framerate.denom())
    } else {
        0.0
    };

    // Container durations are rounded to the muxer's time base; snap to
    // whole frames so 40 frames at 20 fps list as exactly two seconds
    let frames = (duration_secs * fps).round() as u32;
    let duration_secs = if fps > 0.0 {
        f64::from(frames) / fps
    } else {
        duration_secs
    };

    Ok(VideoInfo {
        width: video.width(),
        height: video.height(),
        fps,
        frames,
        duration_secs,
    })
}
