//! JPEG boundary scanner
//!
//! Complete images are `FF D8 .. FF D9`. Anything before a start-of-image
//! marker is noise (multipart headers, boundaries) and is dropped.

use bytes::{Buf, Bytes, BytesMut};
use tracing::warn;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

fn find_marker(haystack: &[u8], marker: [u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

pub struct FrameExtractor {
    buffer: BytesMut,
    /// Buffer starts with SOI
    in_image: bool,
    /// Offset where the next EOI search starts
    scan_from: usize,
    max_frame_bytes: usize,
    overflows: u64,
}

impl FrameExtractor {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            in_image: false,
            scan_from: 0,
            max_frame_bytes: max_frame_bytes.max(4),
            overflows: 0,
        }
    }

    /// Append bytes read from the network
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the next complete image, if the buffer holds one
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if !self.in_image {
            match find_marker(&self.buffer, SOI) {
                Some(start) => {
                    self.buffer.advance(start);
                    self.in_image = true;
                    self.scan_from = SOI.len();
                }
                None => {
                    // A trailing 0xFF may be the first half of a split SOI
                    let keep = usize::from(self.buffer.last() == Some(&0xFF));
                    let drop = self.buffer.len() - keep;
                    self.buffer.advance(drop);
                    return None;
                }
            }
        }

        match find_marker(&self.buffer[self.scan_from..], EOI) {
            Some(pos) => {
                let end = self.scan_from + pos + EOI.len();
                self.in_image = false;
                self.scan_from = 0;
                Some(self.buffer.split_to(end).freeze())
            }
            None => {
                // Resume on the last byte so a split EOI is still found
                self.scan_from = self.buffer.len().saturating_sub(1).max(SOI.len());
                if self.buffer.len() > self.max_frame_bytes {
                    warn!(
                        "Discarding {} buffered bytes without an end-of-image marker",
                        self.buffer.len()
                    );
                    self.reset();
                    self.overflows += 1;
                }
                None
            }
        }
    }

    /// Extract every complete image currently buffered, in order
    pub fn drain(&mut self) -> Vec<Bytes> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Bytes kept for the next scan
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Times the buffer was discarded for exceeding the size cap
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_image = false;
        self.scan_from = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(payload: &[u8]) -> Vec<u8> {
        let mut data = SOI.to_vec();
        data.extend_from_slice(payload);
        data.extend_from_slice(&EOI);
        data
    }

    #[test]
    fn test_multiple_images_in_one_chunk() {
        let a = image(b"first");
        let b = image(b"second");
        let mut chunk = a.clone();
        chunk.extend_from_slice(&b);
        chunk.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3]);

        let mut extractor = FrameExtractor::new(1024);
        extractor.push(&chunk);
        let frames = extractor.drain();

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], &a[..]);
        assert_eq!(&frames[1][..], &b[..]);
        assert_eq!(extractor.pending(), &[0xFF, 0xD8, 1, 2, 3]);
    }

    #[test]
    fn test_noise_before_soi_is_dropped() {
        let a = image(b"xyz");
        let mut chunk = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        chunk.extend_from_slice(&a);
        chunk.extend_from_slice(b"\r\n--frame\r\n");

        let mut extractor = FrameExtractor::new(1024);
        extractor.push(&chunk);
        let frames = extractor.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &a[..]);
        assert!(extractor.pending().is_empty());
    }

    #[test]
    fn test_every_split_point() {
        let a = image(&[1, 0xFF, 2, 3]);
        let b = image(&[4, 5]);
        let mut stream = b"junk".to_vec();
        stream.extend_from_slice(&a);
        stream.extend_from_slice(&b);

        for split in 0..=stream.len() {
            let mut extractor = FrameExtractor::new(1024);
            extractor.push(&stream[..split]);
            let mut frames = extractor.drain();
            extractor.push(&stream[split..]);
            frames.extend(extractor.drain());

            assert_eq!(frames.len(), 2, "split at {}", split);
            assert_eq!(&frames[0][..], &a[..], "split at {}", split);
            assert_eq!(&frames[1][..], &b[..], "split at {}", split);
            assert!(extractor.pending().is_empty());
        }
    }

    #[test]
    fn test_byte_by_byte() {
        let a = image(b"slow camera");
        let mut extractor = FrameExtractor::new(1024);
        let mut frames = Vec::new();
        for byte in &a {
            extractor.push(std::slice::from_ref(byte));
            frames.extend(extractor.drain());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &a[..]);
    }

    #[test]
    fn test_eoi_before_soi_is_ignored() {
        let a = image(b"ok");
        let mut chunk = EOI.to_vec();
        chunk.extend_from_slice(&a);

        let mut extractor = FrameExtractor::new(1024);
        extractor.push(&chunk);
        let frames = extractor.drain();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &a[..]);
    }

    #[test]
    fn test_oversized_image_is_discarded() {
        let mut extractor = FrameExtractor::new(16);
        extractor.push(&SOI);
        extractor.push(&[0u8; 32]);
        assert!(extractor.next_frame().is_none());
        assert_eq!(extractor.overflows(), 1);
        assert!(extractor.pending().is_empty());

        // Recovers on the next image
        let a = image(b"small");
        extractor.push(&a);
        assert_eq!(extractor.drain().len(), 1);
    }
}
