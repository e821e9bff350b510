//! Camera reachability monitoring
//!
//! Runs independently of any viewer and only writes the status table.

pub mod monitor;

pub use monitor::{check_camera, CheckError, HealthMonitor};
