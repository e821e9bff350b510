//! Frame annotation: timestamp and recording indicator

pub mod renderer;

pub use renderer::FrameRenderer;
