//! Motion detector
//!
//! Pipeline per frame pair:
//!
//! ```text
//! |prev - cur| -> gray (BT.601) -> gaussian blur -> binarize -> dilate -> contours -> sum(area)
//! ```
//!
//! Detection is best effort. Anything that goes wrong counts as "no motion"
//! so the viewer stream is never interrupted by it.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use thiserror::Error;
use tracing::trace;

use crate::config::MotionConfig;

#[derive(Debug, Error, PartialEq)]
pub enum MotionError {
    #[error("Frame dimensions differ: {0:?} vs {1:?}")]
    DimensionMismatch((u32, u32), (u32, u32)),

    #[error("Empty frame")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct MotionDetector {
    blur_sigma: f32,
    pixel_threshold: u8,
    dilate_radius: u8,
}

impl MotionDetector {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            pixel_threshold: config.pixel_threshold,
            dilate_radius: config.dilate_iterations,
        }
    }

    /// Whether the changed area between two frames exceeds `threshold`
    pub fn detect(&self, previous: &RgbImage, current: &RgbImage, threshold: u32) -> bool {
        match self.motion_area(previous, current) {
            Ok(area) => area > f64::from(threshold),
            Err(e) => {
                trace!("Motion detection skipped: {}", e);
                false
            }
        }
    }

    /// Summed contour area of the changed regions
    pub fn motion_area(&self, previous: &RgbImage, current: &RgbImage) -> Result<f64, MotionError> {
        if previous.dimensions() != current.dimensions() {
            return Err(MotionError::DimensionMismatch(
                previous.dimensions(),
                current.dimensions(),
            ));
        }
        let (width, height) = current.dimensions();
        if width == 0 || height == 0 {
            return Err(MotionError::Empty);
        }

        let diff = gray_difference(previous, current);
        if diff.as_raw().iter().all(|&v| v == 0) {
            return Ok(0.0);
        }

        let blurred = if self.blur_sigma > 0.0 {
            gaussian_blur_f32(&diff, self.blur_sigma)
        } else {
            diff
        };

        let mut mask = blurred;
        for value in mask.iter_mut() {
            *value = if *value > self.pixel_threshold { 255 } else { 0 };
        }

        // k passes of a 3x3 square kernel == one L-infinity dilation of radius k
        let dilated = dilate(&mask, Norm::LInf, self.dilate_radius);

        let contours = find_contours::<i32>(&dilated);
        Ok(contours.iter().map(contour_area).sum())
    }
}

/// Per-pixel absolute difference converted to intensity
fn gray_difference(previous: &RgbImage, current: &RgbImage) -> GrayImage {
    let pixels = previous
        .as_raw()
        .chunks_exact(3)
        .zip(current.as_raw().chunks_exact(3))
        .map(|(a, b)| {
            let r = f32::from(a[0].abs_diff(b[0]));
            let g = f32::from(a[1].abs_diff(b[1]));
            let b = f32::from(a[2].abs_diff(b[2]));
            (0.299 * r + 0.587 * g + 0.114 * b).round().min(255.0) as u8
        })
        .collect();

    // Same dimensions as the inputs, so the buffer length always matches
    GrayImage::from_raw(previous.width(), previous.height(), pixels)
        .unwrap_or_else(|| GrayImage::new(previous.width(), previous.height()))
}

/// Shoelace area of a contour polygon
fn contour_area(contour: &Contour<i32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y))
        .sum();
    twice_area.abs() as f64 / 2.0
}
