//! MJPEG recording file writer
//!
//! Pipeline: `appsrc (image/jpeg) -> jpegparse -> avimux -> filesink`
//!
//! Camera JPEGs are pushed as they arrive, without re-encoding. Timestamps
//! are derived from the frame index at the nominal frame rate so the file
//! plays back at a steady speed even when the camera delivers unevenly.

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::RecordingError;

/// Time allowed for end-of-stream to reach the file sink
const FINISH_TIMEOUT_SECS: u64 = 5;

fn make_element(factory: &str) -> Result<gst::Element, RecordingError> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| RecordingError::Pipeline(format!("Failed to create {}: {}", factory, e)))
}

pub struct VideoWriter {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    path: PathBuf,
    width: u32,
    height: u32,
    fps: u64,
    frames: u32,
}

impl VideoWriter {
    /// Build the pipeline and open `path` for writing
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, RecordingError> {
        if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(RecordingError::Pipeline(format!(
                "unsupported frame size {}x{}",
                width, height
            )));
        }
        gst::init()?;
        let fps = fps.max(1);

        let caps = gst::Caps::builder("image/jpeg")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(fps as i32, 1))
            .build();

        let appsrc = gst_app::AppSrc::builder()
            .name("src")
            .caps(&caps)
            .format(gst::Format::Time)
            .build();
        let parser = make_element("jpegparse")?;
        let muxer = make_element("avimux")?;
        // Frames are written as fast as they are pushed, not at clock pace
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .property("async", false)
            .property("sync", false)
            .build()
            .map_err(|e| RecordingError::Pipeline(format!("Failed to create filesink: {}", e)))?;

        let pipeline = gst::Pipeline::new();
        pipeline
            .add_many([appsrc.upcast_ref(), &parser, &muxer, &filesink])
            .map_err(|e| RecordingError::Pipeline(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many([appsrc.upcast_ref(), &parser, &muxer, &filesink])
            .map_err(|e| RecordingError::Pipeline(format!("Failed to link elements: {}", e)))?;

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(e.into());
        }
        debug!("Writer pipeline started for {}", path.display());

        Ok(Self {
            pipeline,
            appsrc,
            path: path.to_path_buf(),
            width,
            height,
            fps: u64::from(fps),
            frames: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frames written so far
    pub fn frames(&self) -> u32 {
        self.frames
    }

    fn pts(&self, index: u64) -> gst::ClockTime {
        gst::ClockTime::from_nseconds(index * gst::ClockTime::SECOND.nseconds() / self.fps)
    }

    /// Append one JPEG image
    pub fn write_frame(&mut self, jpeg: Bytes) -> Result<(), RecordingError> {
        self.check_bus()?;

        let index = u64::from(self.frames);
        let pts = self.pts(index);
        let next = self.pts(index + 1);

        let mut buffer = gst::Buffer::from_slice(jpeg);
        {
            let buffer = buffer.make_mut();
            buffer.set_pts(pts);
            buffer.set_duration(gst::ClockTime::from_nseconds(next.nseconds() - pts.nseconds()));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecordingError::Pipeline(format!("Failed to push frame: {:?}", e)))?;
        self.frames += 1;
        Ok(())
    }

    /// Surface an error posted by a downstream element (disk full, ...)
    fn check_bus(&self) -> Result<(), RecordingError> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        match bus.pop_filtered(&[gst::MessageType::Error]) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(err) => Err(RecordingError::Pipeline(format!(
                    "{} ({:?})",
                    err.error(),
                    err.debug()
                ))),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Send end-of-stream and wait until the container is finalized
    ///
    /// Returns the number of frames in the file.
    pub fn finish(self) -> Result<u32, RecordingError> {
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!("Failed to send EOS to {}: {:?}", self.path.display(), e);
        }

        let mut result = Err(RecordingError::Pipeline(format!(
            "Timed out finalizing {}",
            self.path.display()
        )));
        if let Some(bus) = self.pipeline.bus() {
            for msg in bus.iter_timed(gst::ClockTime::from_seconds(FINISH_TIMEOUT_SECS)) {
                match msg.view() {
                    gst::MessageView::Eos(..) => {
                        result = Ok(self.frames);
                        break;
                    }
                    gst::MessageView::Error(err) => {
                        result = Err(RecordingError::Pipeline(format!(
                            "{} ({:?})",
                            err.error(),
                            err.debug()
                        )));
                        break;
                    }
                    _ => {}
                }
            }
        }

        let _ = self.pipeline.set_state(gst::State::Null);
        result
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::read_video_info;
    use crate::video::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn jpeg(width: u32, height: u32) -> Bytes {
        let image = RgbImage::from_pixel(width, height, Rgb([90, 120, 150]));
        Bytes::from(JpegEncoder::new(80).unwrap().encode(&image).unwrap())
    }

    #[test]
    fn test_written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam1_20240101_120000.avi");

        let mut writer = VideoWriter::create(&path, 320, 240, 20).unwrap();
        let frame = jpeg(320, 240);
        for _ in 0..30 {
            writer.write_frame(frame.clone()).unwrap();
        }
        assert_eq!(writer.frames(), 30);
        assert_eq!(writer.finish().unwrap(), 30);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[..4], b"RIFF");
        assert_eq!(&data[8..12], b"AVI ");

        let info = read_video_info(&path).unwrap();
        assert_eq!((info.width, info.height), (320, 240));
        assert_eq!(info.frames, 30);
        assert!((info.duration_secs - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_pts_follow_nominal_rate() {
        let dir = tempfile::tempdir().unwrap();
        let writer = VideoWriter::create(&dir.path().join("a.avi"), 16, 16, 30).unwrap();
        assert_eq!(writer.pts(0), gst::ClockTime::ZERO);
        assert_eq!(writer.pts(30), gst::ClockTime::SECOND);
        assert_eq!(writer.pts(1).nseconds(), 33_333_333);
    }

    #[test]
    fn test_rejects_invalid_size() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VideoWriter::create(&dir.path().join("a.avi"), 0, 480, 20).is_err());
    }

    #[test]
    fn test_missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("a.avi");
        assert!(VideoWriter::create(&path, 64, 48, 20).is_err());
    }
}
