//! Video frame data structures

use bytes::Bytes;
use chrono::{DateTime, Local};
use image::RgbImage;

/// One decoded camera frame
///
/// Keeps the JPEG exactly as the camera sent it next to the decoded pixels:
/// recordings store the untouched bytes while the overlay draws on the
/// pixel buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Original JPEG bytes (cheap clone)
    jpeg: Bytes,
    /// Decoded RGB pixels
    image: RgbImage,
    /// Position in the ingest stream, starting at 0
    pub sequence: u64,
    /// Wall-clock time the frame was extracted
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(jpeg: Bytes, image: RgbImage, sequence: u64) -> Self {
        Self {
            jpeg,
            image,
            sequence,
            captured_at: Local::now(),
        }
    }

    pub fn jpeg(&self) -> &Bytes {
        &self.jpeg
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Age of this frame
    pub fn age(&self) -> chrono::Duration {
        Local::now() - self.captured_at
    }
}
