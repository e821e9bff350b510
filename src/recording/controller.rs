//! Recording state machine
//!
//! ```text
//!            flag on + lease acquired
//!   Idle  ----------------------------->  Recording
//!    ^                                      |
//!    |   flag off / pipeline dropped        |
//!    +--------------------------------------+
//! ```
//!
//! The flag is owned by the control surface; the controller only observes
//! it once per frame. A failed session stays aborted until the flag is
//! switched off, so a full disk does not cause a new file every frame.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::{RecordingError, VideoWriter};
use crate::camera::{CameraStore, RecordingLease};
use crate::config::RecordingConfig;
use crate::events::{EventBus, SystemEvent};
use crate::video::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

struct Session {
    writer: VideoWriter,
    path: PathBuf,
    started_at: DateTime<Local>,
    // Released when the session is dropped
    _lease: RecordingLease,
}

enum Inner {
    Idle,
    Recording(Session),
    /// Aborted on an I/O error, waiting for the flag to go off
    Failed,
}

pub struct RecordingController {
    camera: String,
    dir: PathBuf,
    fps: u32,
    store: Arc<CameraStore>,
    events: Arc<EventBus>,
    inner: Inner,
}

impl RecordingController {
    pub fn new(
        camera: impl Into<String>,
        dir: PathBuf,
        config: &RecordingConfig,
        store: Arc<CameraStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            camera: camera.into(),
            dir,
            fps: config.fps.max(1),
            store,
            events,
            inner: Inner::Idle,
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.inner {
            Inner::Recording(_) => RecordingState::Recording,
            Inner::Idle | Inner::Failed => RecordingState::Idle,
        }
    }

    /// Observe the recording flag for this frame and append it if recording
    ///
    /// Returns whether the camera is being recorded by any pipeline, which is
    /// what the REC indicator shows.
    pub fn process(&mut self, frame: &Frame) -> bool {
        let requested = self.store.is_recording_requested(&self.camera);

        match self.inner {
            Inner::Recording(_) if !requested => self.stop(),
            Inner::Failed if !requested => self.inner = Inner::Idle,
            Inner::Idle if requested => self.try_start(frame),
            _ => {}
        }

        if let Inner::Recording(session) = &mut self.inner {
            match append(session, frame) {
                Ok(()) => {}
                Err(RecordingError::InvalidDimensions { expected, actual }) => {
                    debug!(
                        "Skipping {}x{} frame for {} recording at {}x{}",
                        actual.0, actual.1, self.camera, expected.0, expected.1
                    );
                }
                Err(e) => self.abort(e),
            }
        }

        requested && self.store.leases().is_held(&self.camera)
    }

    fn try_start(&mut self, frame: &Frame) {
        let Some(lease) = self.store.leases().try_acquire(&self.camera) else {
            // Another viewer's pipeline is already writing this camera
            return;
        };

        let started_at = Local::now();
        match self.open(frame, started_at) {
            Ok((writer, path)) => {
                let total = self.store.stats().record_recording_started();
                info!(
                    "Recording {} to {} ({} recordings so far)",
                    self.camera,
                    path.display(),
                    total
                );
                self.events.publish(SystemEvent::RecordingStarted {
                    camera: self.camera.clone(),
                    file: file_name(&path),
                });
                self.inner = Inner::Recording(Session {
                    writer,
                    path,
                    started_at,
                    _lease: lease,
                });
            }
            Err(e) => {
                drop(lease);
                self.abort(e);
            }
        }
    }

    fn open(
        &self,
        frame: &Frame,
        started_at: DateTime<Local>,
    ) -> Result<(VideoWriter, PathBuf), RecordingError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = session_path(&self.dir, &self.camera, started_at);
        let (width, height) = frame.dimensions();
        let writer = VideoWriter::create(&path, width, height, self.fps)?;
        Ok((writer, path))
    }

    /// Finalize the open file, if any
    pub fn stop(&mut self) {
        if let Inner::Recording(session) = std::mem::replace(&mut self.inner, Inner::Idle) {
            self.finish(session);
        }
    }

    fn finish(&self, session: Session) {
        let Session {
            writer,
            path,
            started_at,
            ..
        } = session;
        let file = file_name(&path);

        match writer.finish() {
            Ok(frames) => {
                let secs = (Local::now() - started_at).num_seconds();
                info!(
                    "Stopped recording {}: {} ({} frames, {}s)",
                    self.camera, file, frames, secs
                );
                self.events.publish(SystemEvent::RecordingStopped {
                    camera: self.camera.clone(),
                    file,
                    frames,
                });
            }
            Err(e) => {
                error!("Failed to finalize recording {}: {}", path.display(), e);
                self.events.publish(SystemEvent::RecordingFailed {
                    camera: self.camera.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    fn abort(&mut self, err: RecordingError) {
        error!("Recording for {} aborted: {}", self.camera, err);
        if let Inner::Recording(session) = std::mem::replace(&mut self.inner, Inner::Failed) {
            // Keep whatever was written playable
            if let Err(e) = session.writer.finish() {
                debug!("Finalizing aborted recording failed: {}", e);
            }
        }
        self.events.publish(SystemEvent::RecordingFailed {
            camera: self.camera.clone(),
            reason: err.to_string(),
        });
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn append(session: &mut Session, frame: &Frame) -> Result<(), RecordingError> {
    let expected = session.writer.dimensions();
    let actual = frame.dimensions();
    if expected != actual {
        return Err(RecordingError::InvalidDimensions { expected, actual });
    }
    session.writer.write_frame(frame.jpeg().clone())?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Characters kept in file names; everything else becomes `_`
fn sanitize(camera: &str) -> String {
    camera
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `<dir>/<camera>_<YYYYMMDD_HHMMSS>.avi`, with `_N` appended when a file
/// from the same second already exists
pub fn session_path(dir: &Path, camera: &str, started_at: DateTime<Local>) -> PathBuf {
    let base = format!(
        "{}_{}",
        sanitize(camera).trim_start_matches('.'),
        started_at.format("%Y%m%d_%H%M%S")
    );
    let mut path = dir.join(format!("{}.avi", base));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.avi", base, n));
        n += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::read_video_info;
    use crate::video::JpegEncoder;
    use bytes::Bytes;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        store: Arc<CameraStore>,
        events: Arc<EventBus>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                path: dir.path().join("recordings"),
                _dir: dir,
                store: Arc::new(CameraStore::new(100, 500)),
                events: Arc::new(EventBus::new()),
            }
        }

        fn controller(&self, camera: &str) -> RecordingController {
            RecordingController::new(
                camera,
                self.path.clone(),
                &RecordingConfig::default(),
                self.store.clone(),
                self.events.clone(),
            )
        }

        fn files(&self) -> Vec<PathBuf> {
            let mut files: Vec<_> = std::fs::read_dir(&self.path)
                .map(|rd| rd.map(|e| e.unwrap().path()).collect())
                .unwrap_or_default();
            files.sort();
            files
        }
    }

    fn frame(width: u32, height: u32, seq: u64) -> Frame {
        let shade = (seq * 20 % 256) as u8;
        let image = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
        let jpeg = JpegEncoder::new(80).unwrap().encode(&image).unwrap();
        Frame::new(Bytes::from(jpeg), image, seq)
    }

    #[test]
    fn test_idle_without_flag() {
        let fx = Fixture::new();
        let mut controller = fx.controller("cam1");
        assert!(!controller.process(&frame(64, 48, 0)));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(fx.files().is_empty());
    }

    #[test]
    fn test_records_while_flag_set() {
        let fx = Fixture::new();
        let mut rx = fx.events.subscribe();
        let mut controller = fx.controller("cam1");

        fx.store.set_recording("cam1", true);
        for seq in 0..10 {
            assert!(controller.process(&frame(64, 48, seq)));
        }
        assert_eq!(controller.state(), RecordingState::Recording);
        assert_eq!(fx.store.stats().snapshot().total_recordings, 1);

        fx.store.set_recording("cam1", false);
        assert!(!controller.process(&frame(64, 48, 10)));
        assert_eq!(controller.state(), RecordingState::Idle);

        let files = fx.files();
        assert_eq!(files.len(), 1);
        let info = read_video_info(&files[0]).unwrap();
        assert_eq!((info.width, info.height, info.frames), (64, 48, 10));
        assert_eq!(info.fps, 20.0);

        assert!(matches!(rx.try_recv(), Ok(SystemEvent::RecordingStarted { .. })));
        assert!(matches!(
            rx.try_recv(),
            Ok(SystemEvent::RecordingStopped { frames: 10, .. })
        ));
    }

    #[test]
    fn test_two_sessions_produce_two_files() {
        let fx = Fixture::new();
        let mut controller = fx.controller("cam1");

        for frames in [3u64, 5] {
            fx.store.set_recording("cam1", true);
            for seq in 0..frames {
                controller.process(&frame(32, 32, seq));
            }
            fx.store.set_recording("cam1", false);
            controller.process(&frame(32, 32, 99));
        }

        let files = fx.files();
        assert_eq!(files.len(), 2);
        let mut counts: Vec<u32> = files
            .iter()
            .map(|f| read_video_info(f).unwrap().frames)
            .collect();
        counts.sort();
        assert_eq!(counts, vec![3, 5]);
        assert_eq!(fx.store.stats().snapshot().total_recordings, 2);
    }

    #[test]
    fn test_drop_finalizes_file() {
        let fx = Fixture::new();
        fx.store.set_recording("cam1", true);
        {
            let mut controller = fx.controller("cam1");
            for seq in 0..4 {
                controller.process(&frame(32, 24, seq));
            }
        }
        assert!(!fx.store.leases().is_held("cam1"));
        let files = fx.files();
        assert_eq!(read_video_info(&files[0]).unwrap().frames, 4);
    }

    #[test]
    fn test_single_session_per_camera() {
        let fx = Fixture::new();
        let mut first = fx.controller("cam1");
        let mut second = fx.controller("cam1");
        fx.store.set_recording("cam1", true);

        assert!(first.process(&frame(32, 24, 0)));
        // Second viewer shows REC but does not open another file
        assert!(second.process(&frame(32, 24, 0)));
        assert_eq!(second.state(), RecordingState::Idle);
        assert_eq!(fx.files().len(), 1);
    }

    #[test]
    fn test_mismatched_frames_are_skipped() {
        let fx = Fixture::new();
        let mut controller = fx.controller("cam1");
        fx.store.set_recording("cam1", true);

        controller.process(&frame(32, 24, 0));
        controller.process(&frame(64, 48, 1));
        controller.process(&frame(32, 24, 2));
        controller.stop();

        let files = fx.files();
        assert_eq!(read_video_info(&files[0]).unwrap().frames, 2);
    }

    #[test]
    fn test_io_failure_aborts_until_flag_off() {
        let fx = Fixture::new();
        // A file where the directory should be
        std::fs::write(&fx.path, b"not a directory").unwrap();
        let mut rx = fx.events.subscribe();
        let mut controller = fx.controller("cam1");
        fx.store.set_recording("cam1", true);

        assert!(!controller.process(&frame(32, 24, 0)));
        assert!(!controller.process(&frame(32, 24, 1)));
        assert_eq!(controller.state(), RecordingState::Idle);
        assert!(matches!(rx.try_recv(), Ok(SystemEvent::RecordingFailed { .. })));
        // Not retried every frame
        assert!(rx.try_recv().is_err());

        // Fixing the problem and toggling the flag recovers
        std::fs::remove_file(&fx.path).unwrap();
        fx.store.set_recording("cam1", false);
        controller.process(&frame(32, 24, 2));
        fx.store.set_recording("cam1", true);
        controller.process(&frame(32, 24, 3));
        assert_eq!(controller.state(), RecordingState::Recording);
    }

    #[test]
    fn test_session_path_collision() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local::now();
        let first = session_path(dir.path(), "front door", at);
        std::fs::write(&first, b"").unwrap();
        let second = session_path(dir.path(), "front door", at);

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("front_door_"));
        assert!(name.ends_with(".avi"));
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_1.avi"));
        assert_eq!(first.parent(), Some(Path::new(dir.path())));
    }
}
