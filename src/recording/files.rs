//! Finished recordings on disk

use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{read_video_info, RecordingError};

const EXTENSION: &str = "avi";

/// One recording as listed by the API
#[derive(Debug, Clone, Serialize)]
pub struct RecordingFile {
    pub filename: String,
    pub camera: String,
    /// File size in bytes
    pub size: u64,
    pub created: DateTime<Local>,
    /// `HH:MM:SS`
    pub duration: String,
    pub duration_secs: f64,
    pub frames: u32,
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// List recordings, newest first. A missing directory is an empty list.
pub fn list_recordings(dir: &Path) -> io::Result<Vec<RecordingFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut recordings = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };

        let metadata = entry.metadata()?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Local>::from)
            .unwrap_or_else(|_| Local::now());

        // Unfinished or foreign files are listed with zero duration
        let info = read_video_info(&path)
            .map_err(|e| debug!("Cannot inspect recording {}: {}", filename, e))
            .ok();
        let duration_secs = info.map(|i| i.duration_secs).unwrap_or(0.0);

        recordings.push(RecordingFile {
            camera: camera_from_filename(&filename),
            size: metadata.len(),
            created,
            duration: format_duration(duration_secs),
            duration_secs,
            frames: info.map(|i| i.frames).unwrap_or(0),
            width: info.map(|i| i.width).unwrap_or(0),
            height: info.map(|i| i.height).unwrap_or(0),
            url: format!("/recordings/{}", filename),
            filename,
        });
    }

    recordings.sort_by(|a, b| b.created.cmp(&a.created).then(b.filename.cmp(&a.filename)));
    Ok(recordings)
}

/// Resolve a user supplied file name inside the recordings directory
pub fn recording_path(dir: &Path, filename: &str) -> Result<PathBuf, RecordingError> {
    let valid = !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && Path::new(filename).extension().and_then(|e| e.to_str()) == Some(EXTENSION);
    if !valid {
        return Err(RecordingError::InvalidFileName(filename.to_string()));
    }
    Ok(dir.join(filename))
}

/// Delete a recording. Returns `false` when it does not exist.
pub fn delete_recording(dir: &Path, filename: &str) -> Result<bool, RecordingError> {
    let path = recording_path(dir, filename)?;
    match std::fs::remove_file(&path) {
        Ok(()) => {
            info!("Deleted recording {}", filename);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Camera part of `<camera>_<YYYYMMDD>_<HHMMSS>[_N].avi`
pub fn camera_from_filename(filename: &str) -> String {
    let stem = filename.strip_suffix(".avi").unwrap_or(filename);
    let bytes = stem.as_bytes();
    let digits = |range: std::ops::Range<usize>| {
        bytes
            .get(range)
            .is_some_and(|s| s.iter().all(u8::is_ascii_digit))
    };

    let timestamp_at = (0..bytes.len()).rev().find(|&i| {
        bytes[i] == b'_'
            && digits(i + 1..i + 9)
            && bytes.get(i + 9) == Some(&b'_')
            && digits(i + 10..i + 16)
            && (bytes.len() == i + 16
                || (bytes[i + 16] == b'_' && digits(i + 17..bytes.len()) && bytes.len() > i + 17))
    });

    match timestamp_at {
        Some(i) => stem[..i].to_string(),
        None => stem.split('_').next().unwrap_or(stem).to_string(),
    }
}
