//! Decoded frames and the JPEG codec
//!
//! Cameras send JPEG stills; every pipeline stage after ingestion works on
//! RGB pixels, and the publisher re-encodes after the overlay is drawn.

pub mod codec;
pub mod frame;

pub use codec::{CodecError, JpegDecoder, JpegEncoder};
pub use frame::Frame;
