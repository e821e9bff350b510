//! JPEG decode/encode using TurboJPEG (libjpeg-turbo, SIMD accelerated)
//!
//! Both wrappers keep their turbojpeg handle between frames. They are not
//! shared between pipelines: each viewer pipeline owns one of each.

use image::RgbImage;
use thiserror::Error;
use turbojpeg::{Compressor, Decompressor, Image, PixelFormat as TJPixelFormat};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to create turbojpeg handle: {0}")]
    Init(String),

    #[error("Invalid JPEG header: {0}")]
    Header(String),

    #[error("JPEG decode failed: {0}")]
    Decode(String),

    #[error("JPEG encode failed: {0}")]
    Encode(String),

    #[error("Invalid image dimensions {0}x{1}")]
    InvalidDimensions(usize, usize),
}

/// JPEG -> RGB24 decoder
pub struct JpegDecoder {
    decompressor: Decompressor,
}

impl JpegDecoder {
    pub fn new() -> Result<Self, CodecError> {
        let decompressor = Decompressor::new().map_err(|e| CodecError::Init(e.to_string()))?;
        Ok(Self { decompressor })
    }

    /// Decode a complete JPEG image into RGB pixels
    pub fn decode(&mut self, jpeg: &[u8]) -> Result<RgbImage, CodecError> {
        let header = self
            .decompressor
            .read_header(jpeg)
            .map_err(|e| CodecError::Header(e.to_string()))?;

        if header.width == 0 || header.height == 0 {
            return Err(CodecError::InvalidDimensions(header.width, header.height));
        }

        let pitch = header.width * 3;
        let mut image = Image {
            pixels: vec![0u8; header.height * pitch],
            width: header.width,
            pitch,
            height: header.height,
            format: TJPixelFormat::RGB,
        };

        self.decompressor
            .decompress(jpeg, image.as_deref_mut())
            .map_err(|e| CodecError::Decode(e.to_string()))?;

        RgbImage::from_raw(header.width as u32, header.height as u32, image.pixels)
            .ok_or(CodecError::InvalidDimensions(header.width, header.height))
    }
}

/// RGB24 -> JPEG encoder
pub struct JpegEncoder {
    compressor: Compressor,
    quality: u8,
}

impl JpegEncoder {
    /// Create an encoder with the given quality (clamped to 1-100)
    pub fn new(quality: u8) -> Result<Self, CodecError> {
        let mut compressor = Compressor::new().map_err(|e| CodecError::Init(e.to_string()))?;
        let quality = quality.clamp(1, 100);
        compressor
            .set_quality(quality as i32)
            .map_err(|e| CodecError::Init(e.to_string()))?;
        Ok(Self {
            compressor,
            quality,
        })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&mut self, image: &RgbImage) -> Result<Vec<u8>, CodecError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return Err(CodecError::InvalidDimensions(width, height));
        }

        let source = Image {
            pixels: image.as_raw().as_slice(),
            width,
            pitch: width * 3,
            height,
            format: TJPixelFormat::RGB,
        };

        self.compressor
            .compress_to_vec(source)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
    }

    #[test]
    fn test_encode_produces_jpeg_markers() {
        let mut encoder = JpegEncoder::new(80).unwrap();
        let jpeg = encoder.encode(&gradient(32, 24)).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_decode_keeps_dimensions() {
        let mut encoder = JpegEncoder::new(90).unwrap();
        let jpeg = encoder.encode(&gradient(40, 30)).unwrap();

        let mut decoder = JpegDecoder::new().unwrap();
        let decoded = decoder.decode(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut decoder = JpegDecoder::new().unwrap();
        assert!(decoder.decode(&[0xFF, 0xD8, 0x00, 0x01, 0xFF, 0xD9]).is_err());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegEncoder::new(0).unwrap().quality(), 1);
        assert_eq!(JpegEncoder::new(200).unwrap().quality(), 100);
    }
}
