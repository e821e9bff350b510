//! Camera stream ingestion
//!
//! Cameras serve a continuous HTTP body of concatenated JPEG stills with no
//! length prefix. [`FrameExtractor`] finds image boundaries by marker
//! scanning; [`FrameIngestor`] owns the connection, decodes the images and
//! reconnects when the camera drops.

pub mod extractor;
pub mod ingestor;

pub use extractor::FrameExtractor;
pub use ingestor::{FrameIngestor, IngestError};
