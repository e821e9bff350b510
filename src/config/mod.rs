//! Configuration management
//!
//! Settings sections and the camera registry are persisted in SQLite and
//! cached behind an `ArcSwap` for lock-free reads from the streaming hot
//! path.

mod schema;
mod store;

pub use schema::*;
pub use store::ConfigStore;
