//! Frame-difference motion detection

pub mod detector;

pub use detector::{MotionDetector, MotionError};
