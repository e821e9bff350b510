//! camwatch - networked camera viewer
//!
//! Pulls MJPEG streams from HTTP cameras, detects motion between
//! successive frames, records on demand into MJPEG AVI files, annotates
//! frames for viewers and keeps track of camera reachability.

pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod ingest;
pub mod motion;
pub mod overlay;
pub mod recording;
pub mod state;
pub mod stream;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};
